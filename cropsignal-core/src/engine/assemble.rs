//! Signal assembly for the evaluation row.

use crate::config::ModelConfig;
use crate::decision::{classify, compute_bracket, confidence, PositionSizer};
use crate::domain::{Evaluation, FeatureRow, Signal, UndefinedReason};

/// Compose classifier, bracket and sizer into the evaluation for `row`, the
/// last of the rows `forecasts` is aligned to. `atr` is the ATR on that row.
///
/// No I/O and no state: three terminal outcomes (a trade, HOLD, or undefined).
pub fn assemble(config: &ModelConfig, row: &FeatureRow, forecasts: &[f64], atr: f64) -> Evaluation {
    let date = row.date;
    let Some(t) = forecasts.len().checked_sub(1) else {
        return Evaluation::Undefined {
            date,
            prediction: None,
            reason: UndefinedReason::UndefinedForecast,
        };
    };

    let prediction = forecasts[t];
    if prediction.is_nan() {
        return Evaluation::Undefined {
            date,
            prediction: None,
            reason: UndefinedReason::UndefinedForecast,
        };
    }

    let ranker = config.thresholds.ranker();
    let Some(percentile) = ranker.rank_at(forecasts, t) else {
        return Evaluation::Undefined {
            date,
            prediction: Some(prediction),
            reason: UndefinedReason::InsufficientHistory {
                observations: ranker.observations_at(forecasts, t),
                required: config.thresholds.min_periods,
            },
        };
    };

    let action = classify(
        percentile,
        config.thresholds.long_percentile,
        config.thresholds.short_percentile,
    );

    let bracket = match compute_bracket(action, row.close, atr, &config.stops, date) {
        Ok(b) => b,
        Err(reason) => {
            return Evaluation::Undefined {
                date,
                prediction: Some(prediction),
                reason,
            }
        }
    };

    let sizing = PositionSizer::new(config.r_per_trade, &config.tiers).size(action, percentile);

    Evaluation::Signal(Signal {
        date,
        action,
        confidence: confidence(action, percentile),
        prediction,
        percentile,
        entry_price: row.close,
        stop_loss: bracket.map(|b| b.stop_loss),
        profit_target: bracket.map(|b| b.profit_target),
        position_size_pct: sizing.position_size_pct,
        tier_fraction: sizing.tier_fraction,
        atr,
        time_stop_date: bracket.map(|b| b.time_stop_date),
    })
}
