//! CropSignal CLI — signal generation, replay, and operational checks.
//!
//! Commands:
//! - `generate-signal` — evaluate the latest date for each (commodity, variant)
//! - `verify-data` — summarize each commodity's feature table
//! - `artifact-status` — report bundle age for an external retraining scheduler
//! - `replay` — re-run the live evaluation over a historical date range

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use cropsignal_core::{Evaluation, Signal};
use cropsignal_runner::{
    artifact_status, export_replay_csv, load_table, replay, run_pipeline, should_alert, Alert,
    AlertTarget, LedgerRecord, LogNotifier, Notifier, PipelineOptions, PipelineOutcome, Registry,
    ReplayRange, ReplaySummary, SignalLedger, Target, Upsert, VariantAssets,
    DEFAULT_MAX_AGE_DAYS,
};

/// Registry file picked up from the base directory when `--registry` is not given.
const REGISTRY_FILE_NAME: &str = "cropsignal.toml";

#[derive(Parser)]
#[command(
    name = "cropsignal",
    about = "CropSignal — percentile-ranked, risk-bracketed commodity signals"
)]
struct Cli {
    /// Project root holding data/, models/ and signals/.
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// Commodity registry (TOML). Defaults to <base-dir>/cropsignal.toml, then
    /// the built-in layout.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the most recent date and print the signal.
    GenerateSignal {
        /// Commodity name, or "both" for every registered commodity.
        #[arg(long, default_value = "both")]
        commodity: String,

        /// Model variant. Defaults to every variant registered for the commodity.
        #[arg(long)]
        variant: Option<String>,

        /// Upsert the signals into the ledger.
        #[arg(long, default_value_t = false)]
        save_history: bool,

        /// Hand LONG/SHORT signals to an alert target (email address or chat id).
        #[arg(long)]
        notify: Option<String>,

        /// Print outcomes as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Trailing rows fed to the predictor.
        #[arg(long, default_value_t = cropsignal_core::engine::DEFAULT_WINDOW_ROWS)]
        window_rows: usize,
    },
    /// Summarize each commodity's feature table.
    VerifyData {
        /// Commodity name, or "both".
        #[arg(long, default_value = "both")]
        commodity: String,

        /// Number of trailing closes to print.
        #[arg(long, default_value_t = 3)]
        recent: usize,
    },
    /// Report model bundle age; stale bundles are flagged, never retrained.
    ArtifactStatus {
        #[arg(long, default_value_t = DEFAULT_MAX_AGE_DAYS)]
        max_age_days: i64,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Re-run the live evaluation over historical dates.
    Replay {
        #[arg(long)]
        commodity: String,

        #[arg(long)]
        variant: String,

        /// First date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Write the replay CSV here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = cropsignal_core::engine::DEFAULT_WINDOW_ROWS)]
        window_rows: usize,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let registry = load_registry(&cli.base_dir, cli.registry.as_deref())?;

    match cli.command {
        Commands::GenerateSignal {
            commodity,
            variant,
            save_history,
            notify,
            json,
            window_rows,
        } => run_generate(
            &registry,
            &commodity,
            variant.as_deref(),
            save_history,
            notify.as_deref(),
            json,
            window_rows,
        ),
        Commands::VerifyData { commodity, recent } => run_verify_data(&registry, &commodity, recent),
        Commands::ArtifactStatus { max_age_days, json } => {
            run_artifact_status(&registry, max_age_days, json)
        }
        Commands::Replay {
            commodity,
            variant,
            start,
            end,
            output,
            window_rows,
        } => run_replay(
            &registry,
            &commodity,
            &variant,
            ReplayRange { start, end },
            output.as_deref(),
            window_rows,
        ),
    }
}

fn init_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_registry(base_dir: &Path, explicit: Option<&Path>) -> Result<Registry> {
    if let Some(path) = explicit {
        return Registry::load(path)
            .with_context(|| format!("failed to load registry {}", path.display()));
    }
    let default_file = base_dir.join(REGISTRY_FILE_NAME);
    if default_file.exists() {
        return Registry::load(&default_file)
            .with_context(|| format!("failed to load registry {}", default_file.display()));
    }
    Ok(Registry::default_layout(base_dir))
}

/// "both" (any case) selects every registered commodity.
fn commodity_filter(name: &str) -> Option<&str> {
    if name.eq_ignore_ascii_case("both") || name.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(name)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_generate(
    registry: &Registry,
    commodity: &str,
    variant: Option<&str>,
    save_history: bool,
    notify: Option<&str>,
    json: bool,
    window_rows: usize,
) -> Result<()> {
    let alert_target = notify
        .map(|t| t.parse::<AlertTarget>())
        .transpose()
        .context("invalid --notify target")?;
    let targets = registry.targets(commodity_filter(commodity), variant)?;
    let opts = PipelineOptions {
        window_rows,
        ..PipelineOptions::default()
    };

    let results: Vec<(&Target, _)> = targets
        .par_iter()
        .map(|t| (t, run_pipeline(t, &opts)))
        .collect();

    let mut outcomes: Vec<PipelineOutcome> = Vec::new();
    let mut failures = 0usize;
    for (target, result) in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                failures += 1;
                eprintln!("Error for {} [{}]: {e}", target.display_name, target.variant);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
    }

    if save_history {
        save_to_ledger(&registry.ledger_path(), &outcomes)?;
    }

    if let Some(target) = &alert_target {
        let notifier = LogNotifier;
        for outcome in &outcomes {
            if let Some(signal) = outcome.evaluation.signal().filter(|s| should_alert(s)) {
                let alert = Alert::for_signal(&outcome.display_name, &outcome.variant, signal);
                if let Err(e) = notifier.send(target, &alert) {
                    warn!(error = %e, "alert hand-off failed");
                }
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} signal pipeline(s) failed", targets.len());
    }
    Ok(())
}

fn save_to_ledger(path: &Path, outcomes: &[PipelineOutcome]) -> Result<()> {
    let mut ledger = SignalLedger::open(path)
        .with_context(|| format!("failed to open ledger {}", path.display()))?;
    let mut written = 0usize;
    for outcome in outcomes {
        // Undefined evaluations are reported, not recorded.
        let Some(signal) = outcome.evaluation.signal() else {
            continue;
        };
        let record = LedgerRecord::from_signal(&outcome.commodity, &outcome.variant, signal);
        if ledger.upsert(record) == Upsert::Replaced {
            info!(
                commodity = %outcome.commodity,
                variant = %outcome.variant,
                date = %signal.date,
                "replaced existing ledger row"
            );
        }
        written += 1;
    }
    ledger
        .save()
        .with_context(|| format!("failed to save ledger {}", path.display()))?;
    println!("Saved {written} signal(s) to {}", path.display());
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    println!();
    println!(
        "=== {} [{}] ===",
        outcome.display_name, outcome.variant
    );
    println!("Bundle:         {} ({})", outcome.bundle_id, &outcome.fingerprint[..12]);
    match &outcome.evaluation {
        Evaluation::Signal(s) => print_signal(s),
        Evaluation::Undefined {
            date,
            prediction,
            reason,
        } => {
            println!("Date:           {date}");
            if let Some(p) = prediction {
                println!("Prediction:     {:+.4}%", p * 100.0);
            }
            println!("Action:         HOLD / no signal");
            println!("Reason:         {reason}");
        }
    }
    println!();
}

fn print_signal(s: &Signal) {
    println!("Date:           {}", s.date);
    println!("Action:         {}", s.action);
    println!("Prediction:     {:+.4}%", s.prediction * 100.0);
    println!("Percentile:     {:.1}%", s.percentile * 100.0);
    println!("Confidence:     {:.1}%", s.confidence * 100.0);
    println!("Entry:          {:.2}", s.entry_price);
    println!("ATR:            {:.2}", s.atr);
    if let (Some(stop), Some(target)) = (s.stop_loss, s.profit_target) {
        println!(
            "Stop Loss:      {:.2} ({:.2}%)",
            stop,
            s.stop_pct().unwrap_or(0.0) * 100.0
        );
        println!(
            "Profit Target:  {:.2} ({:.2}%)",
            target,
            s.target_pct().unwrap_or(0.0) * 100.0
        );
    }
    if s.is_trade() {
        println!(
            "Position Size:  {:.1}% (tier {:.2})",
            s.position_size_pct, s.tier_fraction
        );
    }
    if let Some(exit) = s.time_stop_date {
        println!("Time Stop:      {exit}");
    }
}

fn run_verify_data(registry: &Registry, commodity: &str, recent: usize) -> Result<()> {
    let names: Vec<&str> = match commodity_filter(commodity) {
        Some(name) => vec![registry.commodity(name).map(|_| name)?],
        None => registry.commodity_names().collect(),
    };

    let mut failures = 0usize;
    for name in names {
        let spec = registry.commodity(name)?;
        println!();
        println!("=== {} ===", spec.display_name);
        println!("File:           {}", spec.data_path.display());
        let table = match load_table(&spec.data_path) {
            Ok(t) => t,
            Err(e) => {
                failures += 1;
                println!("ERROR: {e}");
                continue;
            }
        };
        let summary = table.summary(recent);
        println!("Rows:           {}", summary.rows);
        println!("Columns:        {}", summary.columns);
        if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
            println!("Date Range:     {first} to {last}");
        }
        println!(
            "High/Low:       {}",
            if summary.has_range {
                "present"
            } else {
                "absent (close-only ATR)"
            }
        );
        if let Some((_, price)) = summary.recent_closes.last() {
            println!("Latest Price:   {price:.2}");
        }
        println!("Recent Closes:");
        for (date, close) in &summary.recent_closes {
            println!("  {date}  {close:.2}");
        }
    }
    println!();

    if failures > 0 {
        bail!("{failures} feature table(s) could not be loaded");
    }
    Ok(())
}

fn run_artifact_status(registry: &Registry, max_age_days: i64, json: bool) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let targets = registry.targets(None, None)?;

    let mut statuses = Vec::with_capacity(targets.len());
    let mut failures = 0usize;
    for t in &targets {
        match artifact_status(
            &t.spec.model_dir,
            t.spec.artifact_suffix.as_deref(),
            today,
            max_age_days,
        ) {
            Ok(status) => statuses.push((t, status)),
            Err(e) => {
                failures += 1;
                eprintln!("Error for {} [{}]: {e}", t.display_name, t.variant);
            }
        }
    }

    if json {
        let docs: Vec<_> = statuses.iter().map(|(_, s)| s).collect();
        println!("{}", serde_json::to_string_pretty(&docs)?);
    } else {
        println!(
            "{:<10} {:<16} {:<20} {:>8} {:<12} {:<6}",
            "Commodity", "Variant", "Bundle", "Age (d)", "Trained To", "Stale"
        );
        println!("{}", "-".repeat(77));
        for (t, s) in &statuses {
            println!(
                "{:<10} {:<16} {:<20} {:>8} {:<12} {:<6}",
                t.commodity,
                t.variant,
                s.bundle_id,
                s.age_days.map_or("?".to_string(), |d| d.to_string()),
                s.trained_through
                    .map_or("-".to_string(), |d| d.to_string()),
                if s.stale { "yes" } else { "no" },
            );
        }
    }

    let stale = statuses.iter().filter(|(_, s)| s.stale).count();
    if stale > 0 {
        warn!(stale, max_age_days, "bundles older than the retraining threshold");
    }
    if failures > 0 {
        bail!("{failures} model bundle(s) could not be loaded");
    }
    Ok(())
}

fn run_replay(
    registry: &Registry,
    commodity: &str,
    variant: &str,
    range: ReplayRange,
    output: Option<&Path>,
    window_rows: usize,
) -> Result<()> {
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if start > end {
            bail!("--start {start} is after --end {end}");
        }
    }
    let targets = registry.targets(Some(commodity), Some(variant))?;
    let target = targets
        .first()
        .context("registry returned no target for the selection")?;
    let opts = PipelineOptions {
        window_rows,
        ..PipelineOptions::default()
    };

    let assets = VariantAssets::load(&target.variant, &target.spec, &opts)?;
    let table = load_table(&target.data_path)?;
    let evaluations = replay(&assets, &table, range, &opts)?;
    if evaluations.is_empty() {
        bail!("no feature-table dates fall within the requested range");
    }

    let csv = export_replay_csv(&evaluations)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, csv)
                .with_context(|| format!("failed to write {}", path.display()))?;
            let s = ReplaySummary::from_evaluations(&evaluations);
            println!(
                "Replayed {} date(s) for {} [{}]: {} LONG, {} SHORT, {} HOLD, {} undefined",
                s.dates, target.display_name, target.variant, s.longs, s.shorts, s.holds, s.undefined
            );
            println!("Written to: {}", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}
