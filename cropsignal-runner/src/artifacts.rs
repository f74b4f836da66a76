//! Model bundle loading and artifact status.
//!
//! A variant directory holds `imputer{suffix}.json`, `scaler{suffix}.json` and
//! `model{suffix}.json`. The requested suffix (e.g. `_2024`) is tried first;
//! otherwise the unsuffixed trio is used. Files from the two generations are
//! never mixed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use cropsignal_core::predictor::{
    BundleError, ImputerStats, ModelArtifact, ModelDocument, ScalerStats,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Artifacts older than this are reported stale by default.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no model bundle in {dir} (tried {tried})")]
    NotFound { dir: PathBuf, tried: String },

    #[error("bundle generation '{suffix}' in {dir} is missing {file}")]
    Incomplete {
        dir: PathBuf,
        suffix: String,
        file: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("inconsistent bundle in {dir}: {source}")]
    Bundle {
        dir: PathBuf,
        #[source]
        source: BundleError,
    },
}

/// The three files of one bundle generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundlePaths {
    pub suffix: String,
    pub imputer: PathBuf,
    pub scaler: PathBuf,
    pub model: PathBuf,
}

impl BundlePaths {
    fn in_dir(dir: &Path, suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            imputer: dir.join(format!("imputer{suffix}.json")),
            scaler: dir.join(format!("scaler{suffix}.json")),
            model: dir.join(format!("model{suffix}.json")),
        }
    }

    fn files(&self) -> [&Path; 3] {
        [&self.imputer, &self.scaler, &self.model]
    }

    /// A generation is selected by its model file; the other two must exist too.
    fn require_complete(self, dir: &Path) -> Result<Self, ArtifactError> {
        if let Some(missing) = self.files().into_iter().find(|p| !p.exists()) {
            return Err(ArtifactError::Incomplete {
                dir: dir.to_path_buf(),
                suffix: self.suffix.clone(),
                file: missing
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
        }
        Ok(self)
    }
}

/// Pick the bundle generation to load from `dir`.
pub fn resolve_bundle(dir: &Path, suffix: Option<&str>) -> Result<BundlePaths, ArtifactError> {
    if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
        let preferred = BundlePaths::in_dir(dir, suffix);
        if preferred.model.exists() {
            return preferred.require_complete(dir);
        }
        debug!(dir = %dir.display(), suffix, "suffixed bundle absent, trying unsuffixed");
    }

    let plain = BundlePaths::in_dir(dir, "");
    if plain.model.exists() {
        return plain.require_complete(dir);
    }

    let tried = match suffix.filter(|s| !s.is_empty()) {
        Some(s) => format!("model{s}.json, model.json"),
        None => "model.json".to_string(),
    };
    Err(ArtifactError::NotFound {
        dir: dir.to_path_buf(),
        tried,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<(T, Vec<u8>), ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((value, bytes))
}

/// A validated bundle plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub artifact: ModelArtifact,
    pub paths: BundlePaths,
    /// BLAKE3 over the imputer, scaler and model files, in that order.
    pub fingerprint: String,
}

/// Resolve, read, and validate a bundle. Any inconsistency is fatal.
pub fn load_bundle(dir: &Path, suffix: Option<&str>) -> Result<LoadedBundle, ArtifactError> {
    let paths = resolve_bundle(dir, suffix)?;

    let (imputer, imputer_bytes): (ImputerStats, _) = read_json(&paths.imputer)?;
    let (scaler, scaler_bytes): (ScalerStats, _) = read_json(&paths.scaler)?;
    let (model, model_bytes): (ModelDocument, _) = read_json(&paths.model)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&imputer_bytes);
    hasher.update(&scaler_bytes);
    hasher.update(&model_bytes);
    let fingerprint = hasher.finalize().to_hex().to_string();

    let artifact =
        ModelArtifact::assemble(imputer, scaler, model).map_err(|source| ArtifactError::Bundle {
            dir: dir.to_path_buf(),
            source,
        })?;

    debug!(
        dir = %dir.display(),
        bundle = artifact.bundle_id(),
        features = artifact.feature_names().len(),
        fingerprint = %&fingerprint[..12],
        "loaded model bundle"
    );

    Ok(LoadedBundle {
        artifact,
        paths,
        fingerprint,
    })
}

/// Age report for a bundle, consumed by an external retraining scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub dir: PathBuf,
    pub suffix: String,
    pub bundle_id: String,
    pub modified: Option<DateTime<Utc>>,
    pub trained_through: Option<NaiveDate>,
    pub age_days: Option<i64>,
    pub stale: bool,
}

/// Inspect a bundle's age relative to `today`.
///
/// Age comes from the model file's modification time. An unreadable time is
/// reported as stale.
pub fn artifact_status(
    dir: &Path,
    suffix: Option<&str>,
    today: NaiveDate,
    max_age_days: i64,
) -> Result<ArtifactStatus, ArtifactError> {
    let bundle = load_bundle(dir, suffix)?;

    let modified: Option<DateTime<Utc>> = match fs::metadata(&bundle.paths.model)
        .and_then(|m| m.modified())
    {
        Ok(t) => Some(t.into()),
        Err(e) => {
            warn!(path = %bundle.paths.model.display(), error = %e, "cannot read modification time");
            None
        }
    };
    let age_days = modified.map(|m| (today - m.date_naive()).num_days());

    Ok(ArtifactStatus {
        dir: dir.to_path_buf(),
        suffix: bundle.paths.suffix.clone(),
        bundle_id: bundle.artifact.bundle_id().to_string(),
        modified,
        trained_through: bundle.artifact.trained_through(),
        age_days,
        stale: age_days.map_or(true, |age| age > max_age_days),
    })
}
