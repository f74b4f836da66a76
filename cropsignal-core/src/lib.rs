//! CropSignal Core — the signal decision engine.
//!
//! Turns a scalar return forecast into a risk-bracketed trading instruction:
//! - Domain types (feature windows, signals, evaluations)
//! - Rolling statistics (SMA, ATR, percentile rank)
//! - Predictor adapter over a frozen imputer + scaler + model bundle
//! - Decision components (classifier, tier sizer, risk bracket)
//! - Variant configuration and presets
//!
//! No file I/O lives here; loading and persistence belong to the runner.

pub mod config;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod predictor;

pub use config::{ConfigError, ModelConfig, VariantPreset};
pub use domain::{Action, Evaluation, FeatureRow, FeatureWindow, Signal, UndefinedReason};
pub use engine::{SignalEngine, SignalError};
pub use predictor::{PipelinePredictor, PredictError, Predictor};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across pipeline threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::FeatureWindow>();
        require_sync::<domain::FeatureWindow>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::Evaluation>();
        require_sync::<domain::Evaluation>();
        require_send::<domain::PredictionRecord>();
        require_sync::<domain::PredictionRecord>();

        // Config and engine
        require_send::<config::ModelConfig>();
        require_sync::<config::ModelConfig>();
        require_send::<engine::SignalEngine>();
        require_sync::<engine::SignalEngine>();

        // Predictor
        require_send::<predictor::ModelArtifact>();
        require_sync::<predictor::ModelArtifact>();
        require_send::<predictor::PipelinePredictor>();
        require_sync::<predictor::PipelinePredictor>();
    }

    /// Architecture contract: the engine sees only the window and the predictor.
    ///
    /// There is no ledger, position, or previous-signal parameter, so an
    /// evaluation cannot depend on what was emitted before.
    #[test]
    fn engine_has_no_state_parameter() {
        fn _check_signature(
            engine: &SignalEngine,
            window: &FeatureWindow,
            predictor: &dyn Predictor,
        ) -> Result<Evaluation, SignalError> {
            engine.evaluate(window, predictor)
        }
    }
}
