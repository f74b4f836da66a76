//! Frozen preprocessing + model bundle.
//!
//! A bundle is three documents (imputer, scaler, model) written by the same
//! training run. Each names its `bundle_id` and the ordered `feature_names` it
//! was fitted on; assembling a [`ModelArtifact`] fails unless all three agree.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{Model, ModelError};

#[derive(Debug, Error, PartialEq)]
pub enum BundleError {
    #[error("{part} belongs to bundle '{found}', expected '{expected}'")]
    BundleId {
        part: &'static str,
        expected: String,
        found: String,
    },

    #[error("{part} was fitted on a different feature list than the model")]
    FeatureNames { part: &'static str },

    #[error("{part} has {actual} values, expected {expected}")]
    Width {
        part: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{part} value {index} is not finite")]
    NonFinite { part: &'static str, index: usize },

    #[error("bundle has no features")]
    NoFeatures,

    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
}

/// Median imputer: per-feature fill value for missing inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputerStats {
    pub bundle_id: String,
    pub feature_names: Vec<String>,
    pub fill_values: Vec<f64>,
}

/// Robust scaler: `(x - center) / scale` per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerStats {
    pub bundle_id: String,
    pub feature_names: Vec<String>,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub bundle_id: String,
    pub feature_names: Vec<String>,
    /// Last date in the training set, when the trainer records it.
    #[serde(default)]
    pub trained_through: Option<NaiveDate>,
    pub model: Model,
}

/// Validated imputer + scaler + model from one training run. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    bundle_id: String,
    feature_names: Vec<String>,
    trained_through: Option<NaiveDate>,
    fill_values: Vec<f64>,
    center: Vec<f64>,
    scale: Vec<f64>,
    model: Model,
}

impl ModelArtifact {
    /// Assemble a bundle, rejecting parts from different training runs.
    ///
    /// The model document is authoritative for `bundle_id` and the feature list.
    pub fn assemble(
        imputer: ImputerStats,
        scaler: ScalerStats,
        model: ModelDocument,
    ) -> Result<Self, BundleError> {
        let n = model.feature_names.len();
        if n == 0 {
            return Err(BundleError::NoFeatures);
        }

        for (part, id, names) in [
            ("imputer", &imputer.bundle_id, &imputer.feature_names),
            ("scaler", &scaler.bundle_id, &scaler.feature_names),
        ] {
            if *id != model.bundle_id {
                return Err(BundleError::BundleId {
                    part,
                    expected: model.bundle_id.clone(),
                    found: id.clone(),
                });
            }
            if *names != model.feature_names {
                return Err(BundleError::FeatureNames { part });
            }
        }

        check_values("imputer fill values", &imputer.fill_values, n)?;
        check_values("scaler center", &scaler.center, n)?;
        check_values("scaler scale", &scaler.scale, n)?;
        model.model.validate(n)?;

        // A constant feature fitted to zero spread scales by 1.
        let scale = scaler
            .scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            bundle_id: model.bundle_id,
            feature_names: model.feature_names,
            trained_through: model.trained_through,
            fill_values: imputer.fill_values,
            center: scaler.center,
            scale,
            model: model.model,
        })
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn trained_through(&self) -> Option<NaiveDate> {
        self.trained_through
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Impute then scale one row in place.
    pub fn preprocess(&self, row: &mut [f64]) {
        for (i, v) in row.iter_mut().enumerate() {
            if v.is_nan() {
                *v = self.fill_values[i];
            }
            *v = (*v - self.center[i]) / self.scale[i];
        }
    }
}

fn check_values(part: &'static str, values: &[f64], expected: usize) -> Result<(), BundleError> {
    if values.len() != expected {
        return Err(BundleError::Width {
            part,
            expected,
            actual: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(BundleError::NonFinite { part, index });
    }
    Ok(())
}

/// Build a consistent linear bundle for tests.
#[cfg(test)]
pub fn linear_bundle(names: &[&str], weights: &[f64]) -> ModelArtifact {
    let feature_names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let n = feature_names.len();
    ModelArtifact::assemble(
        ImputerStats {
            bundle_id: "test".into(),
            feature_names: feature_names.clone(),
            fill_values: vec![0.0; n],
        },
        ScalerStats {
            bundle_id: "test".into(),
            feature_names: feature_names.clone(),
            center: vec![0.0; n],
            scale: vec![1.0; n],
        },
        ModelDocument {
            bundle_id: "test".into(),
            feature_names,
            trained_through: None,
            model: Model::Linear {
                intercept: 0.0,
                weights: weights.to_vec(),
            },
        },
    )
    .unwrap()
}
