//! Keyed table store for cleaned and joined frames.
//!
//! [`SqliteStore`] keeps every key as one Arrow IPC blob in the `_frames`
//! table of a single SQLite file, next to a few `_`-prefixed bookkeeping
//! tables (manifest, input fingerprints, indicator vocabulary). Column names
//! never become SQL identifiers, so names that differ only in case survive.
//! [`InMemoryStore`] backs tests.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use polars::prelude::{DataFrame, IpcReader, IpcWriter, SerReader, SerWriter};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

use crate::error::{PrepError, Result};
use crate::metrics::StoreMetrics;
use crate::pipeline::ingestion::fingerprint::InputFile;
use crate::pipeline::processing::Vocabulary;

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]+_[a-z]+$").expect("valid key regex"));

/// Reject keys that are not `<table>_<mode>`.
pub fn validate_key(key: &str) -> Result<()> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(PrepError::InvalidKey(key.to_string()))
    }
}

/// Which run wrote a key, and what it looked like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub key: String,
    pub run_id: String,
    pub mode: String,
    pub rows: usize,
    pub columns: usize,
    pub written_at: DateTime<Utc>,
}

/// Storage for pipeline outputs
pub trait Store {
    /// Write `frame` under `key`, replacing any previous table with that key.
    fn write_frame(&mut self, key: &str, frame: &DataFrame) -> Result<()>;
    fn read_frame(&self, key: &str) -> Result<DataFrame>;
    /// Stored table keys, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    fn record_manifest(&mut self, entry: &ManifestEntry) -> Result<()>;
    fn manifest(&self) -> Result<Vec<ManifestEntry>>;

    fn record_inputs(&mut self, run_id: &str, inputs: &[InputFile]) -> Result<()>;

    fn save_vocabulary(&mut self, vocab: &Vocabulary) -> Result<()>;
    fn load_vocabulary(&self) -> Result<Option<Vocabulary>>;
}

fn encode_frame(frame: &DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    IpcWriter::new(&mut buf).finish(&mut frame.clone())?;
    Ok(buf)
}

fn decode_frame(bytes: Vec<u8>) -> Result<DataFrame> {
    Ok(IpcReader::new(Cursor::new(bytes)).finish()?)
}

fn check_writable(key: &str, frame: &DataFrame) -> Result<()> {
    validate_key(key)?;
    if frame.width() == 0 {
        return Err(PrepError::shape(key, "cannot store a table with no columns"));
    }
    Ok(())
}

/// Single-file SQLite store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS _frames (
                key         TEXT PRIMARY KEY,
                data        BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS _manifest (
                key         TEXT PRIMARY KEY,
                run_id      TEXT NOT NULL,
                mode        TEXT NOT NULL,
                rows        INTEGER NOT NULL,
                columns     INTEGER NOT NULL,
                written_at  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS _inputs (
                run_id      TEXT NOT NULL,
                mode        TEXT NOT NULL,
                source      TEXT NOT NULL,
                path        TEXT NOT NULL,
                sha256      TEXT NOT NULL,
                bytes       INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS _vocabulary (
                column_name TEXT NOT NULL,
                position    INTEGER NOT NULL,
                value       TEXT NOT NULL,
                PRIMARY KEY (column_name, position)
            );
            "#,
        )?;
        Ok(Self { conn })
    }
}

impl Store for SqliteStore {
    fn write_frame(&mut self, key: &str, frame: &DataFrame) -> Result<()> {
        check_writable(key, frame)?;
        let started = Instant::now();
        let data = encode_frame(frame)?;
        self.conn.execute(
            "INSERT INTO _frames (key, data) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET data=excluded.data",
            params![key, data],
        )?;

        let secs = started.elapsed().as_secs_f64();
        StoreMetrics::record_key_written(key, frame.height(), secs);
        debug!(key, rows = frame.height(), bytes = data.len(), secs, "Wrote table");
        Ok(())
    }

    fn read_frame(&self, key: &str) -> Result<DataFrame> {
        validate_key(key)?;
        let data: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT data FROM _frames WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        match data {
            Some(bytes) => decode_frame(bytes),
            None => Err(PrepError::MissingKey(key.to_string())),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM _frames ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn record_manifest(&mut self, entry: &ManifestEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO _manifest (key, run_id, mode, rows, columns, written_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(key) DO UPDATE SET run_id=excluded.run_id, mode=excluded.mode,
                 rows=excluded.rows, columns=excluded.columns, written_at=excluded.written_at",
            params![
                entry.key,
                entry.run_id,
                entry.mode,
                entry.rows as i64,
                entry.columns as i64,
                entry.written_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, run_id, mode, rows, columns, written_at FROM _manifest ORDER BY key",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(key, run_id, mode, rows, columns, written_at)| {
                let written_at = DateTime::parse_from_rfc3339(&written_at)
                    .map_err(|e| PrepError::shape("_manifest", format!("bad timestamp for {}: {}", key, e)))?
                    .with_timezone(&Utc);
                Ok(ManifestEntry {
                    key,
                    run_id,
                    mode,
                    rows: rows as usize,
                    columns: columns as usize,
                    written_at,
                })
            })
            .collect()
    }

    fn record_inputs(&mut self, run_id: &str, inputs: &[InputFile]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO _inputs (run_id, mode, source, path, sha256, bytes) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for input in inputs {
                stmt.execute(params![
                    run_id,
                    input.mode.as_str(),
                    input.table.name(),
                    input.path.to_string_lossy().into_owned(),
                    input.sha256,
                    input.bytes as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_vocabulary(&mut self, vocab: &Vocabulary) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM _vocabulary", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO _vocabulary (column_name, position, value) VALUES (?1, ?2, ?3)")?;
            for (column, values) in vocab.iter() {
                for (position, value) in values.iter().enumerate() {
                    stmt.execute(params![column, position as i64, value])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_vocabulary(&self) -> Result<Option<Vocabulary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT column_name, value FROM _vocabulary ORDER BY column_name, position")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (column, value) in rows {
            match grouped.last_mut() {
                Some((last, values)) if *last == column => values.push(value),
                _ => grouped.push((column, vec![value])),
            }
        }
        let mut vocab = Vocabulary::new();
        for (column, values) in grouped {
            vocab.insert(column, values);
        }
        Ok(Some(vocab))
    }
}

/// In-memory store implementation for development/testing
#[derive(Default)]
pub struct InMemoryStore {
    frames: HashMap<String, DataFrame>,
    manifest: HashMap<String, ManifestEntry>,
    inputs: Vec<(String, InputFile)>,
    vocabulary: Option<Vocabulary>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(&self) -> &[(String, InputFile)] {
        &self.inputs
    }
}

impl Store for InMemoryStore {
    fn write_frame(&mut self, key: &str, frame: &DataFrame) -> Result<()> {
        check_writable(key, frame)?;
        self.frames.insert(key.to_string(), frame.clone());
        StoreMetrics::record_key_written(key, frame.height(), 0.0);
        Ok(())
    }

    fn read_frame(&self, key: &str) -> Result<DataFrame> {
        validate_key(key)?;
        self.frames
            .get(key)
            .cloned()
            .ok_or_else(|| PrepError::MissingKey(key.to_string()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.frames.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn record_manifest(&mut self, entry: &ManifestEntry) -> Result<()> {
        self.manifest.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let mut entries: Vec<ManifestEntry> = self.manifest.values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn record_inputs(&mut self, run_id: &str, inputs: &[InputFile]) -> Result<()> {
        self.inputs
            .extend(inputs.iter().map(|i| (run_id.to_string(), i.clone())));
        Ok(())
    }

    fn save_vocabulary(&mut self, vocab: &Vocabulary) -> Result<()> {
        self.vocabulary = Some(vocab.clone());
        Ok(())
    }

    fn load_vocabulary(&self) -> Result<Option<Vocabulary>> {
        Ok(self.vocabulary.clone())
    }
}
