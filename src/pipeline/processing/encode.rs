use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::error::{PrepError, Result};
use crate::metrics::CleaningMetrics;
use crate::table;

/// Categories known for each categorical column, in indicator order.
///
/// Fitted once on training data and reused for every other mode so all modes
/// share the same indicator columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    columns: BTreeMap<String, Vec<String>>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the distinct present values of each named column, sorted.
    pub fn fit_columns(&mut self, frame: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
        for &name in columns {
            let distinct: BTreeSet<String> = table::text(frame, table, name)?
                .into_iter()
                .flatten()
                .map(|v| v.trim().to_string())
                .collect();
            self.columns.insert(name.to_string(), sort_labels(distinct.into_iter().collect()));
        }
        Ok(())
    }

    pub fn insert(&mut self, column: impl Into<String>, values: Vec<String>) {
        self.columns.insert(column.into(), values);
    }

    pub fn values(&self, column: &str) -> Option<&[String]> {
        self.columns.get(column).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn covers(&self, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.columns.contains_key(*c))
    }
}

/// Numeric order when every label is a number (`1, 2, 10`), text order
/// otherwise.
fn sort_labels(labels: Vec<String>) -> Vec<String> {
    let parsed: Option<Vec<(f64, String)>> = labels
        .iter()
        .map(|l| l.parse::<f64>().ok().map(|n| (n, l.clone())))
        .collect();
    match parsed {
        Some(mut numbers) => {
            numbers.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            numbers.into_iter().map(|(_, l)| l).collect()
        }
        None => {
            let mut labels = labels;
            labels.sort();
            labels
        }
    }
}

pub fn indicator_name(column: &str, value: &str) -> String {
    format!("{}_{}", column, value)
}

/// Expand `column` into one `u8` indicator per vocabulary value.
///
/// A row's indicators are all zero when its value is missing or not in the
/// vocabulary.
pub fn expand(frame: &DataFrame, table: &str, column: &str, vocab: &Vocabulary) -> Result<Vec<Series>> {
    let values = vocab.values(column).ok_or_else(|| {
        PrepError::shape(table, format!("no vocabulary for column '{}'", column))
    })?;
    let cells: Vec<Option<&str>> = table::text(frame, table, column)?
        .into_iter()
        .map(|c| c.map(str::trim))
        .collect();

    let unseen = cells
        .iter()
        .flatten()
        .filter(|cell| !values.iter().any(|v| v == *cell))
        .count();
    if unseen > 0 {
        warn!(
            table,
            column,
            rows = unseen,
            "Values outside the training vocabulary get all-zero indicators"
        );
        CleaningMetrics::record_unseen_categories(column, unseen);
    }

    Ok(values
        .iter()
        .map(|value| {
            let flags: Vec<u8> = cells
                .iter()
                .map(|cell| u8::from(*cell == Some(value.as_str())))
                .collect();
            Series::new(indicator_name(column, value).into(), flags)
        })
        .collect())
}
