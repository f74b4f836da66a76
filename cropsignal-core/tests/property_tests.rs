//! Property tests for decision invariants.
//!
//! Uses proptest to verify:
//! 1. Rank invariance: monotonic rescaling leaves percentiles unchanged
//! 2. Window determinism: history outside the window never changes the rank
//! 3. Classifier purity: same inputs, same action
//! 4. Sizing identity: position_size_pct == r × 100 × tier_fraction
//! 5. Bracket strictness: stop adverse, target favorable, ATR ≥ 0
//! 6. Constant-TR round trip: stop distance == multiplier × TR

use chrono::NaiveDate;
use proptest::prelude::*;
use cropsignal_core::config::VariantPreset;
use cropsignal_core::decision::{classify, compute_bracket, PositionSizer, StopParams};
use cropsignal_core::domain::{Action, FeatureRow};
use cropsignal_core::indicators::{Atr, Indicator, RollingPercentileRanker};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_forecasts() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.05..0.05_f64, 20..120)
}

fn arb_percentile() -> impl Strategy<Value = f64> {
    0.0..=1.0_f64
}

fn arb_preset() -> impl Strategy<Value = VariantPreset> {
    prop::sample::select(VariantPreset::ALL.to_vec())
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop::sample::select(vec![Action::Long, Action::Short])
}

fn make_rows(prices: &[(f64, f64, f64)]) -> Vec<FeatureRow> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &(high, low, close))| FeatureRow {
            date: base + chrono::Duration::days(i as i64),
            values: vec![],
            close,
            high: Some(high),
            low: Some(low),
        })
        .collect()
}

// ── 1. Rank invariance ───────────────────────────────────────────────

proptest! {
    /// Strictly increasing transforms preserve every percentile.
    #[test]
    fn rank_invariant_under_monotonic_rescaling(
        forecasts in arb_forecasts(),
        scale in 0.1..50.0_f64,
        shift in -10.0..10.0_f64,
    ) {
        let ranker = RollingPercentileRanker::new(252, 20);
        let affine: Vec<f64> = forecasts.iter().map(|f| f * scale + shift).collect();
        let cubed: Vec<f64> = forecasts.iter().map(|f| f * f * f).collect();

        let base = ranker.rank_series(&forecasts);
        prop_assert_eq!(&base, &ranker.rank_series(&affine));
        prop_assert_eq!(&base, &ranker.rank_series(&cubed));
    }

    /// Percentiles always lie in [0, 1].
    #[test]
    fn rank_in_unit_interval(forecasts in arb_forecasts()) {
        let ranker = RollingPercentileRanker::new(60, 20);
        for p in ranker.rank_series(&forecasts).into_iter().flatten() {
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }
}

// ── 2. Window determinism ────────────────────────────────────────────

proptest! {
    /// The final percentile depends only on the trailing window.
    #[test]
    fn rank_ignores_history_outside_window(
        window in prop::collection::vec(-1.0..1.0_f64, 30),
        prefix_a in prop::collection::vec(-5.0..5.0_f64, 0..50),
        prefix_b in prop::collection::vec(-5.0..5.0_f64, 0..50),
    ) {
        let ranker = RollingPercentileRanker::new(30, 20);
        let a: Vec<f64> = prefix_a.iter().chain(&window).copied().collect();
        let b: Vec<f64> = prefix_b.iter().chain(&window).copied().collect();
        prop_assert_eq!(
            ranker.rank_at(&a, a.len() - 1),
            ranker.rank_at(&b, b.len() - 1)
        );
    }
}

// ── 3. Classifier purity ─────────────────────────────────────────────

proptest! {
    #[test]
    fn classifier_is_pure(p in arb_percentile(), preset in arb_preset()) {
        let t = preset.config().thresholds;
        let first = classify(p, t.long_percentile, t.short_percentile);
        let second = classify(p, t.long_percentile, t.short_percentile);
        prop_assert_eq!(first, second);

        let expected = if p >= t.long_percentile {
            Action::Long
        } else if p <= t.short_percentile {
            Action::Short
        } else {
            Action::Hold
        };
        prop_assert_eq!(first, expected);
    }
}

// ── 4. Sizing identity ───────────────────────────────────────────────

proptest! {
    /// Every classified signal maps to a tier, and the size identity holds exactly.
    #[test]
    fn sizing_identity(p in arb_percentile(), preset in arb_preset()) {
        let config = preset.config();
        let t = config.thresholds;
        let action = classify(p, t.long_percentile, t.short_percentile);
        let sizing = PositionSizer::new(config.r_per_trade, &config.tiers).size(action, p);

        prop_assert_eq!(sizing.position_size_pct, config.r_per_trade * 100.0 * sizing.tier_fraction);
        if action == Action::Hold {
            prop_assert_eq!(sizing.tier_fraction, 0.0);
        } else {
            prop_assert!(sizing.tier_fraction > 0.0 && sizing.tier_fraction <= 1.0);
        }
    }
}

// ── 5. Bracket strictness ────────────────────────────────────────────

proptest! {
    #[test]
    fn bracket_is_strict(
        action in arb_action(),
        entry in 50.0..2000.0_f64,
        atr in 0.01..100.0_f64,
        preset in arb_preset(),
    ) {
        let stops = preset.config().stops;
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let b = compute_bracket(action, entry, atr, &stops, date).unwrap().unwrap();
        let side = action.direction();

        prop_assert!(side * (entry - b.stop_loss) > 0.0, "stop not adverse");
        prop_assert!(side * (b.profit_target - entry) > 0.0, "target not favorable");
        prop_assert!(b.time_stop_date > date);
    }

    #[test]
    fn atr_is_non_negative(
        bars in prop::collection::vec((1.0..500.0_f64, 0.0..20.0_f64, 0.0..1.0_f64), 25..80),
    ) {
        // (low, range, close position within range)
        let prices: Vec<(f64, f64, f64)> = bars
            .iter()
            .map(|&(low, range, pos)| (low + range, low, low + range * pos))
            .collect();
        for v in Atr::new(20).compute(&make_rows(&prices)) {
            prop_assert!(v.is_nan() || v >= 0.0);
        }
    }
}

// ── 6. Constant-TR round trip ────────────────────────────────────────

proptest! {
    /// Flat closes with a fixed high-low spread have TR == spread on every row.
    #[test]
    fn stop_distance_equals_multiplier_times_tr(
        close in 50.0..1000.0_f64,
        tr in 0.25..20.0_f64,
        multiplier in 0.5..5.0_f64,
    ) {
        let prices: Vec<(f64, f64, f64)> = (0..40).map(|_| (close + tr / 2.0, close - tr / 2.0, close)).collect();
        let atr = *Atr::new(20).compute(&make_rows(&prices)).last().unwrap();
        let params = StopParams {
            atr_period: 20,
            atr_multiplier: multiplier,
            profit_target_r: 2.0,
            time_stop_days: 10,
        };
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let b = compute_bracket(Action::Long, close, atr, &params, date).unwrap().unwrap();

        let expected_tr = (close + tr / 2.0) - (close - tr / 2.0);
        prop_assert_eq!(b.stop_distance, multiplier * expected_tr);
    }
}
