// Pipeline module: load, clean, join and persist one mode's tables

pub mod ingestion;
pub mod merge;
pub mod processing;

use chrono::Utc;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, info_span, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::constants::{BASE_CATEGORICAL, PATENT_CATEGORICAL};
use crate::error::Result;
use crate::pipeline::ingestion::fingerprint::InputFile;
use crate::pipeline::ingestion::{load_sources, load_table};
use crate::pipeline::processing::{
    BaseCleaner, Cleaner, MoneyCleaner, PatentCleaner, ReportCleaner, Vocabulary,
};
use crate::storage::{ManifestEntry, Store};
use crate::types::{Mode, TableKind};

/// Shape of one table written by a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySummary {
    pub key: String,
    pub rows: usize,
    pub columns: usize,
}

/// Where the indicator vocabulary of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularySource {
    /// Fitted on this run's training tables
    Fitted,
    /// Read back from the store
    Stored,
    /// Fitted from the training CSVs because the store had none
    Refitted,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub mode: Mode,
    pub vocabulary: VocabularySource,
    pub keys: Vec<KeySummary>,
    pub inputs: Vec<InputFile>,
    pub duration_secs: f64,
}

/// Every categorical column that gets expanded into indicators.
pub fn categorical_columns() -> Vec<&'static str> {
    BASE_CATEGORICAL
        .iter()
        .chain(PATENT_CATEGORICAL.iter())
        .copied()
        .collect()
}

/// Fit the vocabulary from raw base and patent tables.
pub fn fit_vocabulary(base: &DataFrame, patent: &DataFrame) -> Result<Vocabulary> {
    let mut vocab = Vocabulary::new();
    vocab.fit_columns(base, TableKind::Base.name(), &BASE_CATEGORICAL)?;
    vocab.fit_columns(patent, TableKind::Patent.name(), &PATENT_CATEGORICAL)?;
    Ok(vocab)
}

pub struct Pipeline;

impl Pipeline {
    /// Run the whole pipeline for `mode`, writing six keys to `store`.
    ///
    /// Keys are written one at a time; an error aborts the run and leaves the
    /// keys already written in place.
    #[instrument(skip(config, mode, store), fields(mode = %mode))]
    pub fn run(config: &Config, mode: Mode, store: &mut dyn Store) -> Result<PipelineResult> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        info!("🚀 Starting {} run {}", mode, run_id);

        let sources = load_sources(config, mode)?;
        store.record_inputs(&run_id, &sources.inputs)?;

        let (vocab, vocabulary) = Self::resolve_vocabulary(config, mode, &sources.base, &sources.patent, store)?;

        let base = Self::clean_with(&BaseCleaner { vocab: &vocab }, &sources.base, mode)?;
        let patent = Self::clean_with(&PatentCleaner { vocab: &vocab }, &sources.patent, mode)?;
        let money = Self::clean_with(&MoneyCleaner, &sources.money, mode)?;
        let report = Self::clean_with(&ReportCleaner, &sources.report, mode)?;

        let mut keys = Vec::with_capacity(6);
        for (table, frame) in [
            (TableKind::Base, &base),
            (TableKind::Patent, &patent),
            (TableKind::Money, &money),
            (TableKind::Report, &report),
        ] {
            keys.push(Self::persist(store, table, mode, frame, &run_id)?);
        }

        let corp = merge::build_corp(&base, &patent)?;
        keys.push(Self::persist(store, TableKind::Corp, mode, &corp, &run_id)?);

        let finance = merge::build_finance(&money, &report, &corp)?;
        keys.push(Self::persist(store, TableKind::Finance, mode, &finance, &run_id)?);

        let duration_secs = started.elapsed().as_secs_f64();
        info!(
            "✅ {} run finished: {} keys written in {:.2}s",
            mode,
            keys.len(),
            duration_secs
        );

        Ok(PipelineResult {
            run_id,
            mode,
            vocabulary,
            keys,
            inputs: sources.inputs,
            duration_secs,
        })
    }

    /// Train fits and stores the vocabulary. Other modes reuse the stored one,
    /// refitting from the training CSVs when the store has none.
    fn resolve_vocabulary(
        config: &Config,
        mode: Mode,
        base: &DataFrame,
        patent: &DataFrame,
        store: &mut dyn Store,
    ) -> Result<(Vocabulary, VocabularySource)> {
        if mode == Mode::Train {
            let vocab = fit_vocabulary(base, patent)?;
            store.save_vocabulary(&vocab)?;
            info!("📚 Fitted vocabulary for {} categorical columns", vocab.iter().count());
            return Ok((vocab, VocabularySource::Fitted));
        }

        if let Some(vocab) = store.load_vocabulary()? {
            if vocab.covers(&categorical_columns()) {
                info!("📚 Using stored training vocabulary");
                return Ok((vocab, VocabularySource::Stored));
            }
            warn!("Stored vocabulary is incomplete; refitting from training data");
        } else {
            warn!("No stored vocabulary; refitting from training data");
        }

        let (train_base, _) = load_table(
            &config.source_path(Mode::Train, TableKind::Base)?,
            TableKind::Base,
            Mode::Train,
        )?;
        let (train_patent, _) = load_table(
            &config.source_path(Mode::Train, TableKind::Patent)?,
            TableKind::Patent,
            Mode::Train,
        )?;
        let vocab = fit_vocabulary(&train_base, &train_patent)?;
        store.save_vocabulary(&vocab)?;
        Ok((vocab, VocabularySource::Refitted))
    }

    fn clean_with(cleaner: &dyn Cleaner, raw: &DataFrame, mode: Mode) -> Result<DataFrame> {
        let table = cleaner.table();
        let _span = info_span!("clean", table = %table, mode = %mode).entered();
        cleaner.clean(raw)
    }

    fn persist(
        store: &mut dyn Store,
        table: TableKind,
        mode: Mode,
        frame: &DataFrame,
        run_id: &str,
    ) -> Result<KeySummary> {
        let key = table.key(mode);
        store.write_frame(&key, frame)?;
        store.record_manifest(&ManifestEntry {
            key: key.clone(),
            run_id: run_id.to_string(),
            mode: mode.to_string(),
            rows: frame.height(),
            columns: frame.width(),
            written_at: Utc::now(),
        })?;
        info!("💾 Stored {} ({} rows × {} columns)", key, frame.height(), frame.width());
        Ok(KeySummary {
            key,
            rows: frame.height(),
            columns: frame.width(),
        })
    }
}
