//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), TR[0] = high-low.
//! ATR is the simple moving average of TR over `period`.
//!
//! When the feature table carries no high/low, a lower-fidelity range estimate
//! stands in for TR: the rolling 5-day sample standard deviation of absolute
//! 1-day close returns, scaled by close. The SMA over `period` is then taken of
//! that estimate.

use serde::{Deserialize, Serialize};

use crate::domain::{to_missing_policy, FeatureRow};
use crate::indicators::sma::{rolling_mean, rolling_std};
use crate::indicators::Indicator;

/// Window of the close-volatility range estimate.
pub const FALLBACK_VOL_WINDOW: usize = 5;

/// Which range measure the ATR was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSource {
    TrueRange,
    CloseVolatility,
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }

    /// High/low are used only when every row carries both.
    pub fn source_for(rows: &[FeatureRow]) -> AtrSource {
        if !rows.is_empty() && rows.iter().all(FeatureRow::has_range) {
            AtrSource::TrueRange
        } else {
            AtrSource::CloseVolatility
        }
    }
}

/// Compute the True Range series from rows carrying high/low.
///
/// Missing high or low gives NaN. A missing previous close falls back to
/// high-low, the same as the first row.
pub fn true_range(rows: &[FeatureRow]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; rows.len()];

    for (i, row) in rows.iter().enumerate() {
        let (Some(h), Some(l)) = (row.high, row.low) else {
            continue;
        };
        if h.is_nan() || l.is_nan() {
            continue;
        }
        let prev_close = if i > 0 { rows[i - 1].close } else { f64::NAN };
        tr[i] = if prev_close.is_nan() {
            h - l
        } else {
            (h - l).max((h - prev_close).abs()).max((l - prev_close).abs())
        };
    }

    tr
}

/// Range estimate from closes alone: std of |1-day return| over 5 days, times close.
pub fn close_volatility_range(closes: &[f64]) -> Vec<f64> {
    let n = closes.len();
    let mut abs_returns = vec![f64::NAN; n];
    for i in 1..n {
        abs_returns[i] = to_missing_policy((closes[i] / closes[i - 1] - 1.0).abs());
    }

    rolling_std(&abs_returns, FALLBACK_VOL_WINDOW)
        .into_iter()
        .zip(closes)
        .map(|(sd, close)| sd * close)
        .collect()
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, rows: &[FeatureRow]) -> Vec<f64> {
        let range = match Self::source_for(rows) {
            AtrSource::TrueRange => true_range(rows),
            AtrSource::CloseVolatility => {
                let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
                close_volatility_range(&closes)
            }
        };
        rolling_mean(&range, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    fn make_ohlc_rows(data: &[(f64, f64, f64)]) -> Vec<FeatureRow> {
        let base_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| FeatureRow {
                date: base_date + chrono::Duration::days(i as i64),
                values: vec![],
                close,
                high: Some(high),
                low: Some(low),
            })
            .collect()
    }

    fn close_only(closes: &[f64]) -> Vec<FeatureRow> {
        let mut rows = make_ohlc_rows(
            &closes.iter().map(|&c| (c, c, c)).collect::<Vec<_>>(),
        );
        for r in &mut rows {
            r.high = None;
            r.low = None;
        }
        rows
    }

    #[test]
    fn true_range_basic() {
        let rows = make_ohlc_rows(&[
            (105.0, 95.0, 102.0),  // TR = 105-95 = 10
            (108.0, 100.0, 106.0), // TR = max(8, |108-102|, |100-102|) = 8
            (107.0, 98.0, 99.0),   // TR = max(9, |107-106|, |98-106|) = 9
        ]);
        let tr = true_range(&rows);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        // Gap up: prev close 100, current bar 108-115
        let rows = make_ohlc_rows(&[(102.0, 97.0, 100.0), (115.0, 108.0, 112.0)]);
        let tr = true_range(&rows);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_is_simple_average_of_true_range() {
        let rows = make_ohlc_rows(&[
            (105.0, 95.0, 102.0),  // TR = 10
            (108.0, 100.0, 106.0), // TR = 8
            (107.0, 98.0, 99.0),   // TR = 9
            (103.0, 97.0, 101.0),  // TR = 6
            (106.0, 100.0, 105.0), // TR = 6
        ]);
        let result = Atr::new(3).compute(&rows);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 9.0, DEFAULT_EPSILON);
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 7.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_missing_high_uses_fallback() {
        let mut rows = make_ohlc_rows(&[
            (105.0, 95.0, 102.0),
            (108.0, 100.0, 106.0),
            (107.0, 98.0, 99.0),
        ]);
        rows[1].high = None;
        assert_eq!(Atr::source_for(&rows), AtrSource::CloseVolatility);
    }

    #[test]
    fn atr_nan_high_propagates() {
        let mut rows = make_ohlc_rows(&[
            (105.0, 95.0, 102.0),
            (108.0, 100.0, 106.0),
            (107.0, 98.0, 99.0),
            (103.0, 97.0, 101.0),
        ]);
        rows[1].high = Some(f64::NAN);
        let result = Atr::new(2).compute(&rows);
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], 7.5, DEFAULT_EPSILON);
    }

    #[test]
    fn fallback_waits_for_return_window() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + (i % 3) as f64).collect();
        let range = close_volatility_range(&closes);
        // Return[0] is undefined, so the first full 5-return window ends at index 5.
        for (i, v) in range.iter().enumerate().take(5) {
            assert!(v.is_nan(), "expected NaN at index {i}");
        }
        assert!(range[5].is_finite());

        let atr = Atr::new(3).compute(&close_only(&closes));
        assert!(atr[6].is_nan());
        assert!(atr[7].is_finite());
        assert!(atr[7] >= 0.0);
    }

    #[test]
    fn fallback_of_steady_growth_is_zero() {
        // Constant 1% daily growth: |returns| are equal, so their std is 0.
        let closes: Vec<f64> = (0..10).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let range = close_volatility_range(&closes);
        assert_approx(range[9], 0.0, 1e-9);
    }

    #[test]
    fn zero_close_becomes_missing() {
        let closes = [100.0, 0.0, 100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let range = close_volatility_range(&closes);
        // |100/0 - 1| is inf → NaN, poisoning every window that contains index 2.
        assert!(range[6].is_nan());
        assert!(range[7].is_finite());
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 13);
    }
}
