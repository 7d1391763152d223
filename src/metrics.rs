//! Phase-scoped metrics for a preprocessing run.
//!
//! Metrics go through the `metrics` facade. [`init_metrics`] installs an
//! in-process Prometheus recorder so a short-lived run can dump a text
//! snapshot when it finishes; without it every call is a no-op.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::Result;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names follow `prep_{phase}_{name}` with `_total` on counters.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("prep_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("prep_", $phase, "_", $name)
    };
}

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Write the current metrics in Prometheus text format to `path`.
/// Returns false when no recorder is installed.
pub fn write_snapshot(path: &Path) -> Result<bool> {
    let Some(handle) = HANDLE.get() else {
        return Ok(false);
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, handle.render())?;
    Ok(true)
}

pub struct LoaderMetrics;

impl LoaderMetrics {
    pub fn record_rows_loaded(table: &str, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "loader", "rows"), "table" => table.to_string())
            .increment(rows as u64);
    }

    pub fn record_bytes_read(table: &str, bytes: usize) {
        ::metrics::counter!(phase_metric!(counter, "loader", "bytes"), "table" => table.to_string())
            .increment(bytes as u64);
    }
}

pub struct CleaningMetrics;

impl CleaningMetrics {
    /// Cells filled by one imputation rule (`mean`, `median`, `rate`, `ratio`, `zero`, `ffill`).
    pub fn record_imputed(table: &str, rule: &'static str, cells: usize) {
        ::metrics::counter!(
            phase_metric!(counter, "cleaning", "cells_imputed"),
            "table" => table.to_string(),
            "rule" => rule
        )
        .increment(cells as u64);
    }

    pub fn record_unseen_categories(column: &str, rows: usize) {
        ::metrics::counter!(
            phase_metric!(counter, "cleaning", "unseen_categories"),
            "column" => column.to_string()
        )
        .increment(rows as u64);
    }
}

pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_key_written(key: &str, rows: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "store", "keys_written")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "store", "rows_written"), "key" => key.to_string())
            .increment(rows as u64);
        ::metrics::histogram!(phase_metric!(histogram, "store", "write_duration_seconds"))
            .record(duration_secs);
    }
}
