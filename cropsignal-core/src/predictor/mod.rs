//! Predictor adapter: frozen preprocessing + regressor behind a trait.

pub mod adapter;
pub mod artifact;
pub mod model;

pub use adapter::{PipelinePredictor, DEFAULT_MAX_FILL_GAP};
pub use artifact::{BundleError, ImputerStats, ModelArtifact, ModelDocument, ScalerStats};
pub use model::{Model, ModelError, Node, Tree};

use thiserror::Error;

use crate::domain::FeatureWindow;

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("feature set mismatch at position {position}: expected '{expected}', found '{found}'")]
    FeatureSetMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("window has {actual} feature columns, model expects {expected}")]
    FeatureCount { expected: usize, actual: usize },
}

/// Maps a feature window to one forecast per row, in row order.
///
/// Implementations must be deterministic: the same window always yields the
/// same forecasts. Non-finite forecasts are reported as NaN.
pub trait Predictor: Send + Sync {
    fn feature_names(&self) -> &[String];

    fn predict(&self, window: &FeatureWindow) -> Result<Vec<f64>, PredictError>;
}
