//! FeatureRow and FeatureWindow — the minimum context needed to produce one signal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalize a raw numeric cell to the missing-value policy.
///
/// Non-finite values (a ratio feature with a zero denominator yields `inf`)
/// become `NaN`, the single missing marker that flows through the pipeline.
/// Only the frozen imputer replaces it.
pub fn to_missing_policy(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        f64::NAN
    }
}

/// One dated row of pre-computed features plus raw price fields.
///
/// `values` are aligned to the owning window's `columns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub values: Vec<f64>,
    pub close: f64,
    pub high: Option<f64>,
    pub low: Option<f64>,
}

impl FeatureRow {
    /// True when both `high` and `low` are present for this row.
    pub fn has_range(&self) -> bool {
        self.high.is_some() && self.low.is_some()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("row {row} has {actual} feature values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("rows not strictly increasing by date: {previous} followed by {next}")]
    Unordered { previous: NaiveDate, next: NaiveDate },
}

/// A trailing slice of the feature table, ordered by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureWindow {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureWindow {
    /// Build a window, checking row width and strict date ordering.
    pub fn new(columns: Vec<String>, rows: Vec<FeatureRow>) -> Result<Self, WindowError> {
        for (i, row) in rows.iter().enumerate() {
            if row.values.len() != columns.len() {
                return Err(WindowError::RowWidth {
                    row: i,
                    expected: columns.len(),
                    actual: row.values.len(),
                });
            }
        }
        for pair in rows.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(WindowError::Unordered {
                    previous: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The evaluation row (most recent date).
    pub fn last(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// High/low are usable only if every row in the window carries them.
    pub fn has_range(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(FeatureRow::has_range)
    }

    /// The trailing `n` rows as a new window (or the whole window if shorter).
    pub fn tail(&self, n: usize) -> Self {
        let start = self.rows.len().saturating_sub(n);
        Self {
            columns: self.columns.clone(),
            rows: self.rows[start..].to_vec(),
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }
}

/// Build a window of synthetic rows for tests.
///
/// Close follows `closes`; high/low are close ± 1.0; features are two columns
/// derived from the index so they are deterministic.
#[cfg(test)]
pub fn make_window(closes: &[f64]) -> FeatureWindow {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let rows = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| FeatureRow {
            date: base + chrono::Duration::days(i as i64),
            values: vec![i as f64, close / 100.0],
            close,
            high: Some(close + 1.0),
            low: Some(close - 1.0),
        })
        .collect();
    FeatureWindow::new(vec!["f_index".into(), "f_close".into()], rows).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, values: Vec<f64>) -> FeatureRow {
        FeatureRow {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            values,
            close: 450.0,
            high: None,
            low: None,
        }
    }

    #[test]
    fn non_finite_becomes_missing() {
        assert!(to_missing_policy(f64::INFINITY).is_nan());
        assert!(to_missing_policy(f64::NEG_INFINITY).is_nan());
        assert!(to_missing_policy(f64::NAN).is_nan());
        assert_eq!(to_missing_policy(1.25), 1.25);
    }

    #[test]
    fn rejects_wrong_row_width() {
        let err = FeatureWindow::new(vec!["a".into(), "b".into()], vec![row(1, vec![1.0])])
            .unwrap_err();
        assert_eq!(
            err,
            WindowError::RowWidth {
                row: 0,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = FeatureWindow::new(
            vec!["a".into()],
            vec![row(2, vec![1.0]), row(1, vec![2.0])],
        )
        .unwrap_err();
        assert!(matches!(err, WindowError::Unordered { .. }));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = FeatureWindow::new(
            vec!["a".into()],
            vec![row(2, vec![1.0]), row(2, vec![2.0])],
        )
        .unwrap_err();
        assert!(matches!(err, WindowError::Unordered { .. }));
    }

    #[test]
    fn tail_keeps_most_recent_rows() {
        let w = make_window(&[1.0, 2.0, 3.0, 4.0]);
        let t = w.tail(2);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[0].close, 3.0);
        assert_eq!(t.columns(), w.columns());
        assert_eq!(w.tail(10).len(), 4);
    }

    #[test]
    fn range_requires_every_row() {
        let mut w = make_window(&[1.0, 2.0]);
        assert!(w.has_range());
        w.rows[0].high = None;
        assert!(!w.has_range());
    }
}
