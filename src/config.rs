use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PrepError, Result};
use crate::types::{Mode, TableKind};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    /// Source file sets keyed by mode name (`train`, `validate`)
    pub files: BTreeMap<String, DatasetFiles>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding the source CSVs
    pub dir: PathBuf,
    /// Keyed output store. A single SQLite file stands in for the HDF5 store
    /// `dataset/preprocessed-data.h5`, with the same location, base name and
    /// `<table>_<mode>` keys.
    pub store: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// Source file names for one mode, relative to `dataset.dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFiles {
    pub base: String,
    pub money: String,
    pub patent: String,
    pub report: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl DatasetFiles {
    pub fn file_for(&self, table: TableKind) -> Option<&str> {
        match table {
            TableKind::Base => Some(&self.base),
            TableKind::Money => Some(&self.money),
            TableKind::Patent => Some(&self.patent),
            TableKind::Report => Some(&self.report),
            TableKind::Corp | TableKind::Finance => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut files = BTreeMap::new();
        files.insert(
            Mode::Train.to_string(),
            DatasetFiles {
                base: "base_train_sum.csv".to_string(),
                money: "money_report_train_sum.csv".to_string(),
                patent: "patent_train_sum.csv".to_string(),
                report: "year_report_train_sum.csv".to_string(),
            },
        );
        files.insert(
            Mode::Validate.to_string(),
            DatasetFiles {
                base: "base_verify1.csv".to_string(),
                money: "money_information_verify1.csv".to_string(),
                patent: "patent_information_verify1.csv".to_string(),
                report: "year_report_verify1.csv".to_string(),
            },
        );
        Self {
            dataset: DatasetConfig {
                dir: PathBuf::from("dataset"),
                store: PathBuf::from("dataset/preprocessed-data.sqlite"),
                log_dir: default_log_dir(),
            },
            files,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PrepError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config at {}, using built-in dataset table", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for mode in Mode::all() {
            let files = self.files(mode)?;
            for table in TableKind::SOURCES {
                if files.file_for(table).map_or(true, |f| f.trim().is_empty()) {
                    return Err(PrepError::Config(format!(
                        "files.{}.{} must name a CSV file",
                        mode, table
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn files(&self, mode: Mode) -> Result<&DatasetFiles> {
        self.files
            .get(mode.as_str())
            .ok_or_else(|| PrepError::Config(format!("no [files.{}] table", mode)))
    }

    /// Full path of the CSV for `table` under `mode`.
    pub fn source_path(&self, mode: Mode, table: TableKind) -> Result<PathBuf> {
        let name = self
            .files(mode)?
            .file_for(table)
            .ok_or_else(|| PrepError::Config(format!("'{}' is not a source table", table)))?;
        Ok(self.dataset.dir.join(name))
    }
}
