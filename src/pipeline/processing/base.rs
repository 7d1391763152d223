use polars::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::constants::{BASE_CATEGORICAL, BASE_NUMERIC, FLAG, ID};
use crate::error::Result;
use crate::metrics::CleaningMetrics;
use crate::pipeline::processing::encode::{expand, Vocabulary};
use crate::pipeline::processing::Cleaner;
use crate::table;
use crate::types::TableKind;

/// Clean the enterprise base table.
///
/// Output columns: `ID`, the mean-imputed numeric attributes, one indicator
/// group per categorical attribute, then the `flag` label.
#[instrument(skip_all, fields(table = "base", rows = raw.height()))]
pub fn clean_base(raw: &DataFrame, vocab: &Vocabulary) -> Result<DataFrame> {
    let name = TableKind::Base.name();
    let mut columns: Vec<Column> = vec![table::column(raw, name, ID)?.clone()];

    let mut imputed = 0;
    for column in BASE_NUMERIC {
        let values = table::numeric(raw, name, column)?;
        let missing = values.null_count();
        match values.mean() {
            Some(mean) => {
                debug!(column, mean, filled = missing, "Mean-imputed");
                imputed += missing;
                columns.push(values.fill_null_with_values(mean)?.into_series().into());
            }
            None => {
                warn!(column, "Column has no values; left missing");
                columns.push(values.clone().into_series().into());
            }
        }
    }

    for column in BASE_CATEGORICAL {
        columns.extend(expand(raw, name, column, vocab)?.into_iter().map(Column::from));
    }

    columns.push(table::column(raw, name, FLAG)?.clone());
    let out = DataFrame::new(columns)?;

    CleaningMetrics::record_imputed(name, "mean", imputed);
    info!(
        "🔧 Cleaned base: {} cells mean-imputed, {} columns",
        imputed,
        out.width()
    );
    Ok(out)
}

pub struct BaseCleaner<'a> {
    pub vocab: &'a Vocabulary,
}

impl Cleaner for BaseCleaner<'_> {
    fn table(&self) -> TableKind {
        TableKind::Base
    }

    fn clean(&self, raw: &DataFrame) -> Result<DataFrame> {
        clean_base(raw, self.vocab)
    }
}
