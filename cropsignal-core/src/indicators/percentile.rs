//! Rolling Percentile Ranker — regime-relative position of a forecast.
//!
//! The fractional rank of `values[t]` among the trailing `window` values
//! (inclusive of `t`), with average-rank tie-breaking, divided by the number
//! of valid (non-NaN) values in that window.
//!
//! ```text
//! rank(t) = #{v < x} + (#{v == x} + 1) / 2        (x = values[t], self included in ==)
//! pct(t)  = rank(t) / #{valid v}
//! ```
//!
//! The ranker is a pure function of the window slice: no hidden state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingPercentileRanker {
    pub window: usize,
    pub min_periods: usize,
}

impl RollingPercentileRanker {
    pub const fn new(window: usize, min_periods: usize) -> Self {
        Self {
            window,
            min_periods,
        }
    }

    fn bounds(&self, t: usize) -> (usize, usize) {
        let len = self.window.max(1).min(t + 1);
        (t + 1 - len, t)
    }

    /// Valid (non-NaN) observations in the window ending at `t`.
    pub fn observations_at(&self, values: &[f64], t: usize) -> usize {
        if t >= values.len() {
            return 0;
        }
        let (start, end) = self.bounds(t);
        values[start..=end].iter().filter(|v| !v.is_nan()).count()
    }

    /// Percentile of `values[t]` in its trailing window.
    ///
    /// `None` when `values[t]` is NaN or the window holds fewer than
    /// `min_periods` valid observations.
    pub fn rank_at(&self, values: &[f64], t: usize) -> Option<f64> {
        let x = *values.get(t)?;
        if x.is_nan() {
            return None;
        }

        let (start, end) = self.bounds(t);
        let mut valid = 0usize;
        let mut below = 0usize;
        let mut equal = 0usize;
        for &v in &values[start..=end] {
            if v.is_nan() {
                continue;
            }
            valid += 1;
            if v < x {
                below += 1;
            } else if v == x {
                equal += 1;
            }
        }

        if valid < self.min_periods.max(1) {
            return None;
        }

        let rank = below as f64 + (equal as f64 + 1.0) / 2.0;
        Some(rank / valid as f64)
    }

    /// Percentile at every index.
    pub fn rank_series(&self, values: &[f64]) -> Vec<Option<f64>> {
        (0..values.len()).map(|t| self.rank_at(values, t)).collect()
    }
}
