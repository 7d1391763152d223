use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::types::{Mode, TableKind};

/// One CSV consumed by a run, identified by content hash.
#[derive(Debug, Clone, Serialize)]
pub struct InputFile {
    pub mode: Mode,
    #[serde(serialize_with = "serialize_table")]
    pub table: TableKind,
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: usize,
}

fn serialize_table<S: serde::Serializer>(table: &TableKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(table.name())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
