//! Signal Classifier — percentile to LONG / SHORT / HOLD.
//!
//! Memoryless: the result depends only on today's percentile and the
//! thresholds, never on a previous day's action or an open position.

use crate::domain::Action;

/// Inclusive threshold classification.
///
/// `percentile >= long_percentile` → LONG, `percentile <= short_percentile` → SHORT,
/// otherwise HOLD. A NaN percentile is HOLD.
pub fn classify(percentile: f64, long_percentile: f64, short_percentile: f64) -> Action {
    if percentile >= long_percentile {
        Action::Long
    } else if percentile <= short_percentile {
        Action::Short
    } else {
        Action::Hold
    }
}

/// Triggering-side probability reported with a signal.
pub fn confidence(action: Action, percentile: f64) -> f64 {
    match action {
        Action::Long => percentile,
        Action::Short => 1.0 - percentile,
        Action::Hold => 0.0,
    }
}
