//! Signal — the immutable, risk-bracketed instruction produced for one evaluation date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of one evaluation. There is no "open position" state:
/// position lifecycle belongs to the consuming execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Long,
    Short,
    Hold,
}

impl Action {
    /// +1 for LONG, -1 for SHORT, 0 for HOLD.
    pub fn direction(self) -> f64 {
        match self {
            Action::Long => 1.0,
            Action::Short => -1.0,
            Action::Hold => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Long => "LONG",
            Action::Short => "SHORT",
            Action::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw forecast and its regime-relative percentile for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub raw_forecast: f64,
    /// `None` until `min_periods` observations exist in the window.
    pub percentile: Option<f64>,
}

/// One trading instruction. Created once per evaluation date, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub date: NaiveDate,
    pub action: Action,
    /// Triggering-side probability: percentile (LONG), 1 - percentile (SHORT), 0 (HOLD).
    pub confidence: f64,
    pub prediction: f64,
    pub percentile: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub profit_target: Option<f64>,
    /// `r_per_trade * 100 * tier_fraction`; 0 for HOLD.
    pub position_size_pct: f64,
    /// Fraction of the full risk unit taken by the matched conviction tier; 0 for HOLD.
    pub tier_fraction: f64,
    pub atr: f64,
    pub time_stop_date: Option<NaiveDate>,
}

impl Signal {
    pub fn is_trade(&self) -> bool {
        self.action != Action::Hold
    }

    /// Distance from entry to stop as a fraction of entry price.
    pub fn stop_pct(&self) -> Option<f64> {
        self.stop_loss
            .filter(|_| self.entry_price != 0.0)
            .map(|stop| (self.entry_price - stop).abs() / self.entry_price)
    }

    /// Distance from entry to target as a fraction of entry price.
    pub fn target_pct(&self) -> Option<f64> {
        self.profit_target
            .filter(|_| self.entry_price != 0.0)
            .map(|target| (target - self.entry_price).abs() / self.entry_price)
    }
}

/// Why no signal could be produced for a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndefinedReason {
    /// Fewer than `min_periods` valid forecasts in the rolling window.
    InsufficientHistory { observations: usize, required: usize },
    /// The model produced a non-finite forecast for the evaluation row.
    UndefinedForecast,
    /// ATR window not yet full, or price fields missing.
    AtrUnavailable,
    /// ATR is zero, so no strictly adverse stop exists.
    ZeroVolatility,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedReason::InsufficientHistory {
                observations,
                required,
            } => write!(
                f,
                "insufficient history: {observations} forecasts in window, {required} required"
            ),
            UndefinedReason::UndefinedForecast => f.write_str("forecast is undefined"),
            UndefinedReason::AtrUnavailable => f.write_str("ATR unavailable for evaluation date"),
            UndefinedReason::ZeroVolatility => f.write_str("ATR is zero, no stop can be placed"),
        }
    }
}

/// Outcome of evaluating one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Evaluation {
    Signal(Signal),
    Undefined {
        date: NaiveDate,
        prediction: Option<f64>,
        reason: UndefinedReason,
    },
}

impl Evaluation {
    pub fn date(&self) -> NaiveDate {
        match self {
            Evaluation::Signal(s) => s.date,
            Evaluation::Undefined { date, .. } => *date,
        }
    }

    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Evaluation::Signal(s) => Some(s),
            Evaluation::Undefined { .. } => None,
        }
    }

    /// The action a consumer should take: HOLD whenever no signal exists.
    pub fn action(&self) -> Action {
        self.signal().map_or(Action::Hold, |s| s.action)
    }
}
