//! Criterion benchmarks for CropSignal hot paths.
//!
//! Benchmarks:
//! 1. Rolling percentile rank over a forecast history
//! 2. ATR (true range and close-only fallback)
//! 3. Full evaluation of one window (predict, rank, bracket, size)
//! 4. Replay-style evaluation over consecutive windows

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cropsignal_core::config::VariantPreset;
use cropsignal_core::domain::{FeatureRow, FeatureWindow};
use cropsignal_core::engine::DEFAULT_WINDOW_ROWS;
use cropsignal_core::indicators::{Atr, Indicator, RollingPercentileRanker};
use cropsignal_core::predictor::{
    ImputerStats, Model, ModelArtifact, ModelDocument, Node, PipelinePredictor, ScalerStats, Tree,
};
use cropsignal_core::SignalEngine;

const FEATURES: usize = 40;

// ── Helpers ──────────────────────────────────────────────────────────

fn feature_names() -> Vec<String> {
    (0..FEATURES).map(|i| format!("f{i}")).collect()
}

fn make_rows(n: usize, with_range: bool) -> Vec<FeatureRow> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 450.0 + (i as f64 * 0.1).sin() * 20.0;
            FeatureRow {
                date: base_date + chrono::Duration::days(i as i64),
                values: (0..FEATURES)
                    .map(|f| ((i * (f + 1)) as f64 * 0.01).cos())
                    .collect(),
                close,
                high: with_range.then_some(close + 3.0),
                low: with_range.then_some(close - 3.0),
            }
        })
        .collect()
}

/// 100 depth-2 trees, roughly the shape of the production regressor.
fn make_predictor() -> PipelinePredictor {
    let trees = (0..100)
        .map(|t| Tree {
            nodes: vec![
                Node::Split {
                    feature: t % FEATURES,
                    threshold: 0.0,
                    left: 1,
                    right: 2,
                    default_left: true,
                },
                Node::Split {
                    feature: (t * 7) % FEATURES,
                    threshold: 0.5,
                    left: 3,
                    right: 4,
                    default_left: false,
                },
                Node::Leaf { value: 0.001 },
                Node::Leaf { value: -0.002 },
                Node::Leaf { value: 0.0015 },
            ],
        })
        .collect();

    let names = feature_names();
    let artifact = ModelArtifact::assemble(
        ImputerStats {
            bundle_id: "bench".into(),
            feature_names: names.clone(),
            fill_values: vec![0.0; FEATURES],
        },
        ScalerStats {
            bundle_id: "bench".into(),
            feature_names: names.clone(),
            center: vec![0.0; FEATURES],
            scale: vec![1.0; FEATURES],
        },
        ModelDocument {
            bundle_id: "bench".into(),
            feature_names: names,
            trained_through: None,
            model: Model::TreeEnsemble {
                base_score: 0.0,
                trees,
            },
        },
    )
    .unwrap();
    PipelinePredictor::new(artifact)
}

// ── 1. Percentile Rank ───────────────────────────────────────────────

fn bench_percentile(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentile_rank");
    let ranker = RollingPercentileRanker::new(252, 20);

    for &n in &[150, 1260, 2520] {
        let values: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
        group.bench_with_input(BenchmarkId::new("series", n), &values, |b, v| {
            b.iter(|| ranker.rank_series(black_box(v)))
        });
    }

    group.finish();
}

// ── 2. ATR ───────────────────────────────────────────────────────────

fn bench_atr(c: &mut Criterion) {
    let mut group = c.benchmark_group("atr");
    let atr = Atr::new(20);

    for (label, with_range) in [("true_range", true), ("close_volatility", false)] {
        let rows = make_rows(2520, with_range);
        group.bench_function(label, |b| b.iter(|| atr.compute(black_box(&rows))));
    }

    group.finish();
}

// ── 3. Single Evaluation ─────────────────────────────────────────────

fn bench_evaluate(c: &mut Criterion) {
    let predictor = make_predictor();
    let window =
        FeatureWindow::new(feature_names(), make_rows(DEFAULT_WINDOW_ROWS, true)).unwrap();

    let mut group = c.benchmark_group("evaluate");
    for preset in VariantPreset::ALL {
        let engine = SignalEngine::new(preset.config()).unwrap();
        group.bench_function(preset.as_str(), |b| {
            b.iter(|| engine.evaluate(black_box(&window), &predictor))
        });
    }
    group.finish();
}

// ── 4. Replay ────────────────────────────────────────────────────────

fn bench_replay(c: &mut Criterion) {
    let predictor = make_predictor();
    let rows = make_rows(DEFAULT_WINDOW_ROWS + 252, true);
    let engine = SignalEngine::new(VariantPreset::Moderate.config()).unwrap();

    c.bench_function("replay_252_days", |b| {
        b.iter(|| {
            for end in DEFAULT_WINDOW_ROWS..=rows.len() {
                let window = FeatureWindow::new(
                    feature_names(),
                    rows[end - DEFAULT_WINDOW_ROWS..end].to_vec(),
                )
                .unwrap();
                black_box(engine.evaluate(&window, &predictor).unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_percentile,
    bench_atr,
    bench_evaluate,
    bench_replay,
);
criterion_main!(benches);
