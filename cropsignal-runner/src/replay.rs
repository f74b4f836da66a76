//! Historical replay — the live evaluation repeated over past dates.
//!
//! For each date in range, the window is the trailing `window_rows` rows
//! ending at that date, built by the same code the live path uses. Dates are
//! independent, so they are evaluated in parallel and collected in date order.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use cropsignal_core::domain::Action;
use cropsignal_core::Evaluation;

use crate::feature_table::FeatureTable;
use crate::pipeline::{PipelineError, PipelineOptions, VariantAssets};

/// Inclusive date bounds; `None` is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ReplayRange {
    fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Evaluate every table date within `range`, oldest first.
pub fn replay(
    assets: &VariantAssets,
    table: &FeatureTable,
    range: ReplayRange,
    opts: &PipelineOptions,
) -> Result<Vec<Evaluation>, PipelineError> {
    let indices: Vec<usize> = table
        .dates()
        .iter()
        .enumerate()
        .filter(|(_, d)| range.contains(**d))
        .map(|(i, _)| i)
        .collect();

    let evaluations = indices
        .par_iter()
        .map(|&i| assets.evaluate_at(table, i + 1, opts))
        .collect::<Result<Vec<_>, _>>()?;

    let summary = ReplaySummary::from_evaluations(&evaluations);
    info!(
        variant = %assets.name,
        dates = summary.dates,
        longs = summary.longs,
        shorts = summary.shorts,
        holds = summary.holds,
        undefined = summary.undefined,
        "replay complete"
    );
    Ok(evaluations)
}

/// Action counts over a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub dates: usize,
    pub longs: usize,
    pub shorts: usize,
    pub holds: usize,
    pub undefined: usize,
}

impl ReplaySummary {
    pub fn from_evaluations(evaluations: &[Evaluation]) -> Self {
        let mut s = Self {
            dates: evaluations.len(),
            ..Self::default()
        };
        for e in evaluations {
            match e.signal().map(|sig| sig.action) {
                Some(Action::Long) => s.longs += 1,
                Some(Action::Short) => s.shorts += 1,
                Some(Action::Hold) => s.holds += 1,
                None => s.undefined += 1,
            }
        }
        s
    }
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

/// Export replay evaluations as CSV, one row per date.
///
/// Columns: date, outcome, action, confidence, prediction, percentile,
/// entry_price, stop_loss, profit_target, position_size_pct, tier_fraction,
/// atr, time_stop_date, reason
pub fn export_replay_csv(evaluations: &[Evaluation]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "date",
        "outcome",
        "action",
        "confidence",
        "prediction",
        "percentile",
        "entry_price",
        "stop_loss",
        "profit_target",
        "position_size_pct",
        "tier_fraction",
        "atr",
        "time_stop_date",
        "reason",
    ])?;

    for e in evaluations {
        let record: Vec<String> = match e {
            Evaluation::Signal(s) => vec![
                s.date.to_string(),
                "signal".into(),
                s.action.as_str().into(),
                format!("{:.6}", s.confidence),
                format!("{:.6}", s.prediction),
                format!("{:.6}", s.percentile),
                format!("{:.4}", s.entry_price),
                opt(s.stop_loss),
                opt(s.profit_target),
                format!("{:.4}", s.position_size_pct),
                format!("{:.4}", s.tier_fraction),
                format!("{:.6}", s.atr),
                s.time_stop_date.map(|d| d.to_string()).unwrap_or_default(),
                String::new(),
            ],
            Evaluation::Undefined {
                date,
                prediction,
                reason,
            } => {
                let mut row = vec![String::new(); 14];
                row[0] = date.to_string();
                row[1] = "undefined".into();
                row[2] = Action::Hold.as_str().into();
                row[4] = opt(*prediction);
                row[13] = reason.to_string();
                row
            }
        };
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
