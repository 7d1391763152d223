// Pipeline ingestion: schema-driven CSV loading and input fingerprints

pub mod fingerprint;
pub mod loader;

pub use loader::{load_sources, load_table, SourceTables, TableSchema};
