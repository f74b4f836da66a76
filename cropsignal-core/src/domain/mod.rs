//! Domain types for CropSignal

pub mod feature;
pub mod signal;

pub use feature::{to_missing_policy, FeatureRow, FeatureWindow, WindowError};
pub use signal::{Action, Evaluation, PredictionRecord, Signal, UndefinedReason};

#[cfg(test)]
pub use feature::make_window;
