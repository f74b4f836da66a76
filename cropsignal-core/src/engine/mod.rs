//! Signal engine — one immutable evaluation per (window, config).
//!
//! ```text
//! window → predictor → forecasts → percentile rank → classifier
//!                                                  ↘ ATR → bracket → sizer → Signal
//! ```
//!
//! The engine holds only the validated [`ModelConfig`]; every call is a pure
//! function of its window and the predictor, so a live run and a historical
//! replay over the same window produce the same result.

pub mod assemble;

pub use assemble::assemble;

use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, ModelConfig};
use crate::domain::{Evaluation, FeatureWindow, PredictionRecord};
use crate::indicators::{Atr, Indicator};
use crate::predictor::{PredictError, Predictor};

/// Default number of trailing feature rows fed to the predictor.
pub const DEFAULT_WINDOW_ROWS: usize = 150;

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    #[error("feature window is empty")]
    EmptyWindow,

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("predictor returned {actual} forecasts for {expected} rows")]
    ForecastCount { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: ModelConfig,
}

impl SignalEngine {
    pub fn new(config: ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Forecast every row of the window.
    pub fn forecasts(
        &self,
        window: &FeatureWindow,
        predictor: &dyn Predictor,
    ) -> Result<Vec<f64>, SignalError> {
        if window.is_empty() {
            return Err(SignalError::EmptyWindow);
        }
        let forecasts = predictor.predict(window)?;
        if forecasts.len() != window.len() {
            return Err(SignalError::ForecastCount {
                expected: window.len(),
                actual: forecasts.len(),
            });
        }
        Ok(forecasts)
    }

    /// Forecast and percentile for every row of the window.
    pub fn predictions(
        &self,
        window: &FeatureWindow,
        predictor: &dyn Predictor,
    ) -> Result<Vec<PredictionRecord>, SignalError> {
        let forecasts = self.forecasts(window, predictor)?;
        let ranker = self.config.thresholds.ranker();
        Ok(window
            .rows()
            .iter()
            .zip(&forecasts)
            .enumerate()
            .map(|(t, (row, &raw_forecast))| PredictionRecord {
                date: row.date,
                raw_forecast,
                percentile: ranker.rank_at(&forecasts, t),
            })
            .collect())
    }

    /// Evaluate the last row of the window.
    pub fn evaluate(
        &self,
        window: &FeatureWindow,
        predictor: &dyn Predictor,
    ) -> Result<Evaluation, SignalError> {
        let forecasts = self.forecasts(window, predictor)?;
        self.evaluate_forecasts(window, &forecasts)
    }

    /// Evaluate the last row given forecasts already aligned to the window rows.
    pub fn evaluate_forecasts(
        &self,
        window: &FeatureWindow,
        forecasts: &[f64],
    ) -> Result<Evaluation, SignalError> {
        let row = window.last().ok_or(SignalError::EmptyWindow)?;
        if forecasts.len() != window.len() {
            return Err(SignalError::ForecastCount {
                expected: window.len(),
                actual: forecasts.len(),
            });
        }

        let atr_series = Atr::new(self.config.stops.atr_period).compute(window.rows());
        let atr = atr_series.last().copied().unwrap_or(f64::NAN);

        let evaluation = assemble(&self.config, row, forecasts, atr);
        debug!(
            variant = %self.config.variant,
            date = %row.date,
            action = %evaluation.action(),
            atr,
            "evaluated window"
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VariantPreset;
    use crate::domain::{make_window, Action, UndefinedReason};

    /// Replays a fixed forecast vector for whatever window it is given.
    struct FixedForecasts(Vec<f64>);

    impl Predictor for FixedForecasts {
        fn feature_names(&self) -> &[String] {
            &[]
        }

        fn predict(&self, window: &FeatureWindow) -> Result<Vec<f64>, PredictError> {
            let start = self.0.len() - window.len();
            Ok(self.0[start..].to_vec())
        }
    }

    fn engine(preset: VariantPreset) -> SignalEngine {
        SignalEngine::new(preset.config()).unwrap()
    }

    #[test]
    fn empty_window_is_an_error() {
        let w = make_window(&[]);
        let e = engine(VariantPreset::Moderate);
        assert_eq!(
            e.evaluate(&w, &FixedForecasts(vec![])),
            Err(SignalError::EmptyWindow)
        );
    }

    #[test]
    fn short_forecast_vector_is_an_error() {
        let w = make_window(&[100.0; 5]);
        let e = engine(VariantPreset::Moderate);
        assert!(matches!(
            e.evaluate_forecasts(&w, &[0.0; 4]),
            Err(SignalError::ForecastCount { expected: 5, actual: 4 })
        ));
    }

    #[test]
    fn insufficient_history_reports_counts() {
        let w = make_window(&[100.0; 10]);
        let forecasts: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let e = engine(VariantPreset::Moderate);
        let eval = e.evaluate(&w, &FixedForecasts(forecasts)).unwrap();
        assert_eq!(eval.action(), Action::Hold);
        assert!(matches!(
            eval,
            Evaluation::Undefined {
                reason: UndefinedReason::InsufficientHistory {
                    observations: 10,
                    required: 20
                },
                ..
            }
        ));
    }

    #[test]
    fn predictions_align_with_rows() {
        let w = make_window(&[100.0; 25]);
        let forecasts: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let e = engine(VariantPreset::Moderate);
        let records = e.predictions(&w, &FixedForecasts(forecasts)).unwrap();
        assert_eq!(records.len(), 25);
        assert_eq!(records[0].date, w.rows()[0].date);
        assert!(records[18].percentile.is_none());
        assert_eq!(records[24].percentile, Some(1.0));
    }

    #[test]
    fn rising_forecasts_go_long() {
        let closes: Vec<f64> = (0..40).map(|i| 400.0 + i as f64).collect();
        let w = make_window(&closes);
        let forecasts: Vec<f64> = (0..40).map(|i| i as f64 * 0.001).collect();
        let e = engine(VariantPreset::Moderate);
        let eval = e.evaluate(&w, &FixedForecasts(forecasts)).unwrap();
        let s = eval.signal().unwrap();
        assert_eq!(s.action, Action::Long);
        assert_eq!(s.tier_fraction, 1.0);
        assert!(s.stop_loss.unwrap() < s.entry_price);
    }
}
