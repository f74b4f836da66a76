//! Pipeline predictor: forward-fill, impute, scale, score.

use tracing::debug;

use super::{ModelArtifact, PredictError, Predictor};
use crate::domain::{to_missing_policy, FeatureWindow};

/// Longest run of consecutive missing values a forward fill may cover.
pub const DEFAULT_MAX_FILL_GAP: usize = 5;

#[derive(Debug, Clone)]
pub struct PipelinePredictor {
    artifact: ModelArtifact,
    max_fill_gap: usize,
}

impl PipelinePredictor {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            artifact,
            max_fill_gap: DEFAULT_MAX_FILL_GAP,
        }
    }

    pub fn with_max_fill_gap(mut self, gap: usize) -> Self {
        self.max_fill_gap = gap;
        self
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    fn check_columns(&self, columns: &[String]) -> Result<(), PredictError> {
        let expected = self.artifact.feature_names();
        for (position, (want, got)) in expected.iter().zip(columns).enumerate() {
            if want != got {
                return Err(PredictError::FeatureSetMismatch {
                    position,
                    expected: want.clone(),
                    found: got.clone(),
                });
            }
        }
        if expected.len() != columns.len() {
            return Err(PredictError::FeatureCount {
                expected: expected.len(),
                actual: columns.len(),
            });
        }
        Ok(())
    }
}

/// Forward-fill each column from earlier rows, covering at most `limit`
/// consecutive missing values after the last observed one.
pub fn forward_fill(matrix: &mut [Vec<f64>], limit: usize) {
    let width = matrix.first().map_or(0, Vec::len);
    for col in 0..width {
        let mut last: Option<f64> = None;
        let mut run = 0usize;
        for row in matrix.iter_mut() {
            let v = row[col];
            if v.is_nan() {
                run += 1;
                if let Some(prev) = last {
                    if run <= limit {
                        row[col] = prev;
                    }
                }
            } else {
                last = Some(v);
                run = 0;
            }
        }
    }
}

impl Predictor for PipelinePredictor {
    fn feature_names(&self) -> &[String] {
        self.artifact.feature_names()
    }

    fn predict(&self, window: &FeatureWindow) -> Result<Vec<f64>, PredictError> {
        self.check_columns(window.columns())?;

        let mut matrix: Vec<Vec<f64>> = window
            .rows()
            .iter()
            .map(|r| r.values.iter().copied().map(to_missing_policy).collect())
            .collect();
        forward_fill(&mut matrix, self.max_fill_gap);

        let forecasts: Vec<f64> = matrix
            .iter_mut()
            .map(|row| {
                self.artifact.preprocess(row);
                to_missing_policy(self.artifact.model().score(row))
            })
            .collect();

        debug!(
            bundle = self.artifact.bundle_id(),
            rows = forecasts.len(),
            "scored feature window"
        );
        Ok(forecasts)
    }
}
