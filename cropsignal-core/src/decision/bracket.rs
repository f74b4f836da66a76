//! Risk Bracket — volatility-scaled stop-loss, profit target, and time stop.
//!
//! ```text
//! stop_distance = atr_multiplier * ATR
//! LONG:  stop = entry - stop_distance,  target = entry + target_r * stop_distance
//! SHORT: stop = entry + stop_distance,  target = entry - target_r * stop_distance
//! time_stop_date = evaluation_date + time_stop_days (calendar days)
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{Action, UndefinedReason};

/// Stop/target/time-stop parameters for one model variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopParams {
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub profit_target_r: f64,
    pub time_stop_days: i64,
}

/// Computed bracket for a LONG or SHORT signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBracket {
    pub stop_distance: f64,
    pub stop_loss: f64,
    pub profit_target: f64,
    pub time_stop_date: NaiveDate,
}

/// Bracket builder
pub struct BracketBuilder {
    action: Action,
    entry_price: f64,
    stop_distance: Option<f64>,
    target_r: f64,
    time_stop: Option<NaiveDate>,
}

impl BracketBuilder {
    pub fn new(action: Action, entry_price: f64) -> Self {
        Self {
            action,
            entry_price,
            stop_distance: None,
            target_r: 1.0,
            time_stop: None,
        }
    }

    pub fn with_stop_distance(mut self, distance: f64) -> Self {
        self.stop_distance = Some(distance);
        self
    }

    pub fn with_target_r(mut self, r: f64) -> Self {
        self.target_r = r;
        self
    }

    pub fn with_time_stop(mut self, evaluation_date: NaiveDate, days: i64) -> Self {
        self.time_stop = Some(evaluation_date + Duration::days(days));
        self
    }

    /// Build the bracket. HOLD, or a missing stop distance / time stop, yields `None`.
    pub fn build(self) -> Option<RiskBracket> {
        let side = self.action.direction();
        if side == 0.0 {
            return None;
        }
        let d = self.stop_distance?;
        Some(RiskBracket {
            stop_distance: d,
            stop_loss: self.entry_price - side * d,
            profit_target: self.entry_price + side * self.target_r * d,
            time_stop_date: self.time_stop?,
        })
    }
}

/// Bracket for `action` at `entry_price` given today's ATR.
///
/// Returns `Ok(None)` for HOLD. A non-finite ATR or entry price is
/// `AtrUnavailable`. A zero ATR, or one too small to move the stop or target
/// off the entry price, is `ZeroVolatility`.
pub fn compute_bracket(
    action: Action,
    entry_price: f64,
    atr: f64,
    params: &StopParams,
    evaluation_date: NaiveDate,
) -> Result<Option<RiskBracket>, UndefinedReason> {
    if action == Action::Hold {
        return Ok(None);
    }
    if !atr.is_finite() || !entry_price.is_finite() {
        return Err(UndefinedReason::AtrUnavailable);
    }
    if atr <= 0.0 {
        return Err(UndefinedReason::ZeroVolatility);
    }

    let bracket = BracketBuilder::new(action, entry_price)
        .with_stop_distance(params.atr_multiplier * atr)
        .with_target_r(params.profit_target_r)
        .with_time_stop(evaluation_date, params.time_stop_days)
        .build();

    // An ATR of rounding-noise size leaves stop or target on the entry price.
    let side = action.direction();
    match bracket {
        Some(b)
            if !(side * (entry_price - b.stop_loss) > 0.0
                && side * (b.profit_target - entry_price) > 0.0) =>
        {
            Err(UndefinedReason::ZeroVolatility)
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StopParams {
        StopParams {
            atr_period: 20,
            atr_multiplier: 3.0,
            profit_target_r: 2.0,
            time_stop_days: 10,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 27).unwrap()
    }

    #[test]
    fn short_bracket_inverts_signs() {
        let b = compute_bracket(Action::Short, 450.0, 5.0, &params(), day())
            .unwrap()
            .unwrap();
        assert_eq!(b.stop_distance, 15.0);
        assert_eq!(b.stop_loss, 465.0);
        assert_eq!(b.profit_target, 420.0);
    }

    #[test]
    fn long_bracket() {
        let b = compute_bracket(Action::Long, 450.0, 5.0, &params(), day())
            .unwrap()
            .unwrap();
        assert_eq!(b.stop_loss, 435.0);
        assert_eq!(b.profit_target, 480.0);
    }

    #[test]
    fn time_stop_uses_calendar_days() {
        let b = compute_bracket(Action::Long, 450.0, 5.0, &params(), day())
            .unwrap()
            .unwrap();
        // Crosses a weekend and the year boundary.
        assert_eq!(b.time_stop_date, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    }

    #[test]
    fn hold_has_no_bracket() {
        assert_eq!(
            compute_bracket(Action::Hold, 450.0, 5.0, &params(), day()),
            Ok(None)
        );
        assert_eq!(
            compute_bracket(Action::Hold, 450.0, f64::NAN, &params(), day()),
            Ok(None)
        );
    }

    #[test]
    fn nan_atr_is_unavailable() {
        assert_eq!(
            compute_bracket(Action::Long, 450.0, f64::NAN, &params(), day()),
            Err(UndefinedReason::AtrUnavailable)
        );
    }

    #[test]
    fn zero_atr_is_zero_volatility() {
        assert_eq!(
            compute_bracket(Action::Short, 450.0, 0.0, &params(), day()),
            Err(UndefinedReason::ZeroVolatility)
        );
    }

    #[test]
    fn negligible_atr_is_zero_volatility() {
        // 3 * 1.41e-16 vanishes against an entry near 5.46.
        let entry = 5.462976449884154;
        assert_eq!(
            compute_bracket(Action::Long, entry, 1.41e-16, &params(), day()),
            Err(UndefinedReason::ZeroVolatility)
        );
        assert_eq!(
            compute_bracket(Action::Short, entry, 1.41e-16, &params(), day()),
            Err(UndefinedReason::ZeroVolatility)
        );
    }

    #[test]
    fn builder_without_stop_is_none() {
        assert!(BracketBuilder::new(Action::Long, 100.0)
            .with_time_stop(day(), 5)
            .build()
            .is_none());
    }
}
