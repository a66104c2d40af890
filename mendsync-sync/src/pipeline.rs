//! Sync pipeline entrypoint: read both stores, reconcile, execute.

use mendsync_core::{
    AssociationSet, AssociationStore, BaselineStore, SnapshotError, SnapshotFile,
};
use mendsync_store::{AccessMode, MendeleyDb};

use crate::config::SyncConfig;
use crate::engine::reconcile;
use crate::error::SyncError;
use crate::executor::{execute, ExecutionReport, Mode};
use crate::plan::ChangePlan;
use crate::probe::{FileProbe, RootProbe};

/// Everything a caller needs to report on a finished run.
#[derive(Debug)]
pub struct SyncOutcome {
    pub plan: ChangePlan,
    pub report: ExecutionReport,
    /// `false` on the first run, when no snapshot existed yet.
    pub baseline_existed: bool,
    pub catalog_size: usize,
    pub baseline_size: usize,
}

/// Run against the stores named in `config`.
pub fn run(config: &SyncConfig) -> Result<SyncOutcome, SyncError> {
    let access = match config.mode {
        Mode::Apply => AccessMode::ReadWrite,
        Mode::DryRun => AccessMode::ReadOnly,
    };
    let mut db = MendeleyDb::open(&config.database, config.root.clone(), access)?;
    let mut snapshot = SnapshotFile::new(&config.snapshot);
    let probe = RootProbe::new(config.root.clone());
    run_with(&mut db, &mut snapshot, &probe, config.mode)
}

/// Run against arbitrary store implementations.
///
/// Both stores are read completely before anything is written; a fatal read
/// error leaves both untouched.
pub fn run_with(
    store: &mut dyn AssociationStore,
    snapshot: &mut dyn BaselineStore,
    probe: &dyn FileProbe,
    mode: Mode,
) -> Result<SyncOutcome, SyncError> {
    let catalog = store.current_associations()?;
    let (baseline, baseline_existed) = match snapshot.load_baseline() {
        Ok(set) => (set, true),
        Err(SnapshotError::Missing { path }) => {
            tracing::info!("no snapshot at {}; starting from an empty baseline", path.display());
            (AssociationSet::new(), false)
        }
        Err(err) => return Err(err.into()),
    };
    tracing::debug!(
        "catalog {}: {} links; snapshot {}: {} links",
        store.describe(),
        catalog.len(),
        snapshot.describe(),
        baseline.len()
    );

    let plan = reconcile(&catalog, &baseline, probe);
    for advisory in &plan.advisories {
        tracing::warn!(
            "file missing locally, link kept: {} -> {}",
            advisory.reference,
            advisory.path
        );
    }
    for conflict in &plan.conflicts {
        tracing::warn!("conflict needs manual resolution: {conflict}");
    }

    let report = execute(&plan, &catalog, &baseline, store, snapshot, mode)?;
    Ok(SyncOutcome {
        plan,
        report,
        baseline_existed,
        catalog_size: catalog.len(),
        baseline_size: baseline.len(),
    })
}
