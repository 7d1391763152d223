use polars::prelude::*;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::constants::{self, is_null_token, NULL_TOKENS};
use crate::error::{PrepError, Result};
use crate::metrics::LoaderMetrics;
use crate::pipeline::ingestion::fingerprint::{sha256_hex, InputFile};
use crate::types::{Mode, TableKind};

/// Column roles a source table is expected to carry, resolved by name.
///
/// Declared numeric columns must parse as numbers; declared categorical
/// columns are kept as text whatever they look like. Any other column is
/// numeric when every present cell parses, text otherwise.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: TableKind,
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl TableSchema {
    pub fn for_table(table: TableKind) -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        match table {
            TableKind::Base => {
                let mut numeric = owned(&[constants::ID]);
                numeric.extend(owned(&constants::BASE_NUMERIC));
                numeric.push(constants::FLAG.to_string());
                Self {
                    table,
                    numeric,
                    categorical: owned(&constants::BASE_CATEGORICAL),
                }
            }
            TableKind::Patent => Self {
                table,
                numeric: owned(&[constants::ID]),
                categorical: owned(&constants::PATENT_CATEGORICAL),
            },
            TableKind::Money => {
                let mut numeric = owned(&[constants::ID, constants::YEAR]);
                for (category, _) in constants::MONEY_CATEGORIES {
                    numeric.push(constants::quota_column(category));
                    numeric.push(constants::cost_column(category));
                }
                Self {
                    table,
                    numeric,
                    categorical: Vec::new(),
                }
            }
            TableKind::Report => {
                let mut numeric = owned(&constants::REPORT_DRIVERS);
                numeric.push(constants::OWNERS_EQUITY.to_string());
                Self {
                    table,
                    numeric,
                    categorical: Vec::new(),
                }
            }
            TableKind::Corp | TableKind::Finance => Self {
                table,
                numeric: Vec::new(),
                categorical: Vec::new(),
            },
        }
    }

    fn is_numeric(&self, name: &str) -> bool {
        self.numeric.iter().any(|n| n == name)
    }

    fn is_categorical(&self, name: &str) -> bool {
        self.categorical.iter().any(|n| n == name)
    }
}

/// The four raw tables of one mode, plus what was read to build them.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub base: DataFrame,
    pub patent: DataFrame,
    pub money: DataFrame,
    pub report: DataFrame,
    pub inputs: Vec<InputFile>,
}

/// Parse CSV bytes into a frame typed by `schema`.
///
/// Every field is read as text first, then trimmed and typed column by
/// column so a bad cell can be reported with its row.
pub fn read_table(schema: &TableSchema, bytes: Vec<u8>) -> Result<DataFrame> {
    let table = schema.table.name();
    let null_values = NullValues::AllColumns(NULL_TOKENS.iter().map(|t| (*t).into()).collect());
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_null_values(Some(null_values)))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    let headers: Vec<String> = raw
        .get_column_names()
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    for declared in schema.numeric.iter().chain(&schema.categorical) {
        if !headers.contains(declared) {
            return Err(PrepError::missing_column(table, declared));
        }
    }

    let mut columns = Vec::with_capacity(headers.len());
    for (name, column) in headers.into_iter().zip(raw.get_columns()) {
        let cells: Vec<Option<&str>> = column
            .str()?
            .into_iter()
            .map(|cell| cell.map(str::trim).filter(|c| !is_null_token(c)))
            .collect();

        let series = if schema.is_categorical(&name) {
            Series::new(name.as_str().into(), cells)
        } else if schema.is_numeric(&name) {
            let values = parse_numeric(table, &name, &cells)?;
            Series::new(name.as_str().into(), values)
        } else {
            match parse_numeric(table, &name, &cells) {
                Ok(values) => Series::new(name.as_str().into(), values),
                Err(_) => {
                    debug!(table, column = %name, "Undeclared column kept as text");
                    Series::new(name.as_str().into(), cells)
                }
            }
        };
        columns.push(Column::from(series));
    }
    Ok(DataFrame::new(columns)?)
}

fn parse_numeric(table: &str, column: &str, cells: &[Option<&str>]) -> Result<Vec<Option<f64>>> {
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            None => Ok(None),
            Some(text) => text.parse::<f64>().map(Some).map_err(|_| PrepError::TypeMismatch {
                table: table.to_string(),
                column: column.to_string(),
                row: row + 1,
                value: text.to_string(),
            }),
        })
        .collect()
}

/// Read one source CSV eagerly, returning the frame and its fingerprint.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_table(path: &Path, table: TableKind, mode: Mode) -> Result<(DataFrame, InputFile)> {
    if !path.is_file() {
        return Err(PrepError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)?;
    let input = InputFile {
        mode,
        table,
        path: path.to_path_buf(),
        sha256: sha256_hex(&bytes),
        bytes: bytes.len(),
    };
    let frame = read_table(&TableSchema::for_table(table), bytes)?;

    LoaderMetrics::record_rows_loaded(table.name(), frame.height());
    LoaderMetrics::record_bytes_read(table.name(), input.bytes);
    info!(
        "📥 Loaded {} ({} rows × {} columns)",
        table,
        frame.height(),
        frame.width()
    );
    Ok((frame, input))
}

/// Load the four source tables configured for `mode`.
pub fn load_sources(config: &Config, mode: Mode) -> Result<SourceTables> {
    let mut inputs = Vec::with_capacity(4);
    let mut load = |table: TableKind| -> Result<DataFrame> {
        let path = config.source_path(mode, table)?;
        let (frame, input) = load_table(&path, table, mode)?;
        inputs.push(input);
        Ok(frame)
    };

    let base = load(TableKind::Base)?;
    let money = load(TableKind::Money)?;
    let patent = load(TableKind::Patent)?;
    let report = load(TableKind::Report)?;

    Ok(SourceTables {
        base,
        patent,
        money,
        report,
        inputs,
    })
}
