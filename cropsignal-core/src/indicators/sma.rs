//! Rolling window statistics: simple moving average and sample standard deviation.
//!
//! Both match the trailing-window convention used throughout the engine: the
//! value at index t covers `[t + 1 - period, t]`, is `NaN` until the window is
//! full, and is `NaN` whenever any value in the window is `NaN`.

/// Compensated (Neumaier) sum.
fn neumaier_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut c = 0.0;
    for &v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            c += (sum - t) + v;
        } else {
            c += (v - t) + sum;
        }
        sum = t;
    }
    sum + c
}

/// Simple moving average over a trailing window of `period` values.
///
/// Each window is summed afresh with compensation, so no drift carries from
/// one index to the next. A window of identical values averages to exactly
/// that value.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let first = window[0];
        result[i] = if window.iter().all(|&v| v == first) {
            first
        } else {
            neumaier_sum(window) / period as f64
        };
    }

    result
}

/// Sample standard deviation (n - 1 denominator) over a trailing window.
///
/// Computed directly per window rather than with running sums, so the value at
/// index t depends only on the window contents.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period < 2 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let ss: f64 = window.iter().map(|v| (v - mean) * (v - mean)).sum();
        result[i] = (ss / (period - 1) as f64).sqrt();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn mean_5_basic() {
        let result = rolling_mean(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);

        assert_eq!(result.len(), 7);
        for (i, v) in result.iter().enumerate().take(4) {
            assert!(v.is_nan(), "expected NaN at index {i}");
        }
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn mean_1_is_identity() {
        let result = rolling_mean(&[100.0, 200.0, 300.0], 1);
        assert_eq!(result, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn mean_nan_propagation() {
        let result = rolling_mean(&[10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0], 3);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
        assert_approx(result[5], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn mean_of_constant_window_is_exact() {
        // 107.7 - 100.0 is not 7.7; the mean must return it unchanged.
        let tr = 107.7 - 100.0;
        let mut values = vec![tr; 40];
        values[3] = 1.0;
        let result = rolling_mean(&values, 20);
        assert_eq!(result[39], tr);
        assert_eq!(result[30], tr);
    }

    #[test]
    fn mean_does_not_drift_after_large_values() {
        let mut values = vec![0.1; 30];
        values[0] = 1e16;
        let result = rolling_mean(&values, 5);
        assert_eq!(result[29], 0.1);
        assert_approx(result[4], (1e16 + 0.4) / 5.0, 1.0);
    }

    #[test]
    fn mean_too_few_values() {
        assert!(rolling_mean(&[10.0, 11.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn std_matches_sample_formula() {
        // window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, sum sq dev 32, sample var 32/7
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let result = rolling_std(&values, 8);
        assert_approx(result[7], (32.0_f64 / 7.0).sqrt(), DEFAULT_EPSILON);
        assert!(result[6].is_nan());
    }

    #[test]
    fn std_of_constant_is_zero() {
        let result = rolling_std(&[3.0; 6], 5);
        assert_eq!(result[4], 0.0);
        assert_eq!(result[5], 0.0);
    }

    #[test]
    fn std_nan_propagation() {
        let result = rolling_std(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], (0.5_f64).sqrt(), DEFAULT_EPSILON);
    }
}
