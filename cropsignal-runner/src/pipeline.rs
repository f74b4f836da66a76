//! Signal pipeline — wires registry, feature table, bundle and engine.
//!
//! One pipeline evaluates one (commodity, variant) target. Pipelines share no
//! mutable state, so the CLI may run them in parallel; ledger writes happen
//! afterwards on a single thread.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use cropsignal_core::config::{ConfigError, ModelConfig};
use cropsignal_core::engine::DEFAULT_WINDOW_ROWS;
use cropsignal_core::predictor::{PipelinePredictor, DEFAULT_MAX_FILL_GAP};
use cropsignal_core::{Evaluation, SignalEngine, SignalError};

use crate::artifacts::{load_bundle, ArtifactError, LoadedBundle};
use crate::feature_table::{FeatureTable, TableError};
use crate::registry::{RegistryError, Target, VariantSpec};

/// Errors from a signal pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing config file {path}")]
    MissingConfig { path: PathBuf },

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("{path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("evaluation failed: {0}")]
    Signal(#[from] SignalError),
}

/// Knobs shared by every pipeline in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Trailing rows fed to the predictor.
    pub window_rows: usize,
    pub max_fill_gap: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            window_rows: DEFAULT_WINDOW_ROWS,
            max_fill_gap: DEFAULT_MAX_FILL_GAP,
        }
    }
}

/// Read and validate a variant's JSON config document.
pub fn load_model_config(path: &Path, variant: &str) -> Result<ModelConfig, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingConfig {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    ModelConfig::from_json_str(&text, variant).map_err(|source| PipelineError::Config {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_table(path: &Path) -> Result<FeatureTable, PipelineError> {
    FeatureTable::load(path).map_err(|source| PipelineError::Table {
        path: path.to_path_buf(),
        source,
    })
}

/// Everything loaded once per variant: config, engine, and predictor.
#[derive(Debug, Clone)]
pub struct VariantAssets {
    pub name: String,
    pub engine: SignalEngine,
    pub predictor: PipelinePredictor,
    pub bundle_id: String,
    pub fingerprint: String,
}

impl VariantAssets {
    pub fn load(
        name: &str,
        spec: &VariantSpec,
        opts: &PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let config = load_model_config(&spec.config_path(), name)?;
        let LoadedBundle {
            artifact,
            fingerprint,
            ..
        } = load_bundle(&spec.model_dir, spec.artifact_suffix.as_deref())?;
        let engine = SignalEngine::new(config).map_err(|source| PipelineError::Config {
            path: spec.config_path(),
            source,
        })?;

        Ok(Self {
            name: name.to_string(),
            bundle_id: artifact.bundle_id().to_string(),
            fingerprint,
            predictor: PipelinePredictor::new(artifact).with_max_fill_gap(opts.max_fill_gap),
            engine,
        })
    }

    /// Evaluate the window ending at row `end` (exclusive) of `table`.
    ///
    /// The live path and replay both go through here.
    pub fn evaluate_at(
        &self,
        table: &FeatureTable,
        end: usize,
        opts: &PipelineOptions,
    ) -> Result<Evaluation, PipelineError> {
        let window = table
            .window(self.predictor.artifact().feature_names(), end, opts.window_rows)
            .map_err(|source| PipelineError::Table {
                path: table.path().map(Path::to_path_buf).unwrap_or_default(),
                source,
            })?;
        Ok(self.engine.evaluate(&window, &self.predictor)?)
    }
}

/// Result of one live pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub commodity: String,
    pub display_name: String,
    pub variant: String,
    pub bundle_id: String,
    pub fingerprint: String,
    pub data_hash: String,
    pub latest_date: Option<NaiveDate>,
    pub evaluation: Evaluation,
}

/// Evaluate the most recent date of a target's feature table.
pub fn run_pipeline(target: &Target, opts: &PipelineOptions) -> Result<PipelineOutcome, PipelineError> {
    let assets = VariantAssets::load(&target.variant, &target.spec, opts)?;
    let table = load_table(&target.data_path)?;

    let evaluation = assets.evaluate_at(&table, table.len(), opts)?;

    match &evaluation {
        Evaluation::Signal(s) => info!(
            commodity = %target.commodity,
            variant = %target.variant,
            date = %s.date,
            action = %s.action,
            percentile = s.percentile,
            "signal generated"
        ),
        Evaluation::Undefined { date, reason, .. } => warn!(
            commodity = %target.commodity,
            variant = %target.variant,
            date = %date,
            reason = %reason,
            "no signal"
        ),
    }

    Ok(PipelineOutcome {
        commodity: target.commodity.clone(),
        display_name: target.display_name.clone(),
        variant: target.variant.clone(),
        bundle_id: assets.bundle_id,
        fingerprint: assets.fingerprint,
        data_hash: table.content_hash(),
        latest_date: table.last_date(),
        evaluation,
    })
}
