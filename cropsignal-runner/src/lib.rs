//! CropSignal Runner — everything around the decision engine that touches disk.
//!
//! This crate builds on `cropsignal-core` to provide:
//! - Feature-table loading with name-based column selection
//! - Artifact-bundle resolution, fingerprinting, and staleness status
//! - The commodity/variant registry
//! - Live signal pipelines and historical replay over one shared window builder
//! - The keyed signal ledger
//! - Alert hand-off

pub mod artifacts;
pub mod feature_table;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod replay;

pub use artifacts::{
    artifact_status, load_bundle, resolve_bundle, ArtifactError, ArtifactStatus, BundlePaths,
    LoadedBundle, DEFAULT_MAX_AGE_DAYS,
};
pub use feature_table::{FeatureTable, TableError, TableSummary};
pub use ledger::{LedgerError, LedgerKey, LedgerRecord, SignalLedger, Upsert};
pub use notify::{should_alert, Alert, AlertTarget, LogNotifier, Notifier, NotifyError};
pub use pipeline::{
    load_model_config, load_table, run_pipeline, PipelineError, PipelineOptions, PipelineOutcome,
    VariantAssets,
};
pub use registry::{CommoditySpec, Registry, RegistryError, Target, VariantSpec};
pub use replay::{export_replay_csv, replay, ReplayRange, ReplaySummary};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn variant_assets_is_send_sync() {
        assert_send::<VariantAssets>();
        assert_sync::<VariantAssets>();
    }

    #[test]
    fn feature_table_is_send_sync() {
        assert_send::<FeatureTable>();
        assert_sync::<FeatureTable>();
    }

    #[test]
    fn outcome_and_errors_are_send_sync() {
        assert_send::<PipelineOutcome>();
        assert_sync::<PipelineOutcome>();
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }

    #[test]
    fn notifier_is_object_safe() {
        let n: Box<dyn Notifier> = Box::new(LogNotifier);
        assert_send::<Box<dyn Notifier>>();
        drop(n);
    }
}
