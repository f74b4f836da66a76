//! Rolling-window statistics the decision components depend on.
//!
//! Every series is aligned to its input: index `t` depends only on inputs at
//! or before `t`, and warm-up positions are NaN (or `None` for the ranker).
//! NaN propagates instead of raising.

pub mod atr;
pub mod percentile;
pub mod sma;

pub use atr::{close_volatility_range, true_range, Atr, AtrSource};
pub use percentile::RollingPercentileRanker;
pub use sma::{rolling_mean, rolling_std};

use crate::domain::FeatureRow;

/// A precomputed, per-row series over a feature window.
pub trait Indicator: Send + Sync {
    fn name(&self) -> &str;

    /// Number of rows before the first non-NaN value.
    fn lookback(&self) -> usize;

    /// One value per row; NaN during warm-up or when inputs are missing.
    fn compute(&self, rows: &[FeatureRow]) -> Vec<f64>;
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
