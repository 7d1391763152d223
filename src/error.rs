use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data frame error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Table '{table}', column '{column}', row {row}: expected a number, got '{value}'")]
    TypeMismatch {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("Table '{table}': {message}")]
    Shape { table: String, message: String },

    #[error("Invalid store key: {0}")]
    InvalidKey(String),

    #[error("Key not found in store: {0}")]
    MissingKey(String),
}

impl PrepError {
    pub fn missing_column(table: &str, column: &str) -> Self {
        PrepError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn shape(table: &str, message: impl Into<String>) -> Self {
        PrepError::Shape {
            table: table.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
