//! Plan execution.
//!
//! ## Apply mode
//!
//! 1. Run every catalog entry (`ADD_TO_DB` / `REMOVE_FROM_DB`) in plan order.
//! 2. On the first failure, stop: no further entries, no snapshot write.
//! 3. Write the new baseline as the last step.
//!
//! ## Dry-run mode
//!
//! Nothing is written. The report carries what the snapshot would become and
//! a unified diff against its current text.

use std::path::PathBuf;

use serde::Serialize;

use mendsync_core::{
    snapshot, ApplyOutcome, AssociationSet, AssociationStore, BaselineStore, WriteResult,
};

use crate::diff::snapshot_diff;
use crate::engine::next_baseline;
use crate::error::SyncError;
use crate::plan::{ChangeEntry, ChangePlan, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Apply,
    DryRun,
}

impl Mode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            Mode::DryRun
        } else {
            Mode::Apply
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == Mode::DryRun
    }
}

/// One catalog entry and what the store did with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEntry {
    #[serde(flatten)]
    pub entry: ChangeEntry,
    #[serde(flatten)]
    pub outcome: ApplyOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub mode: Mode,
    /// Catalog entries in the order they were applied. Empty for dry runs.
    pub applied: Vec<AppliedEntry>,
    pub snapshot: WriteResult,
    /// What the snapshot holds (or would hold) after this run.
    #[serde(skip)]
    pub new_baseline: AssociationSet,
    /// Dry-run only: diff of the snapshot text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_diff: Option<String>,
}

impl ExecutionReport {
    pub fn skipped(&self) -> impl Iterator<Item = &AppliedEntry> {
        self.applied
            .iter()
            .filter(|a| matches!(a.outcome, ApplyOutcome::Skipped { .. }))
    }
}

/// Carry out `plan` against both stores.
pub fn execute(
    plan: &ChangePlan,
    catalog: &AssociationSet,
    baseline: &AssociationSet,
    store: &mut dyn AssociationStore,
    snapshot_store: &mut dyn BaselineStore,
    mode: Mode,
) -> Result<ExecutionReport, SyncError> {
    let new_baseline = next_baseline(catalog, baseline, plan);

    if mode.is_dry_run() {
        let rendered = snapshot::render(&new_baseline);
        let current = snapshot_store.current_text()?;
        let label = snapshot_store.describe();
        let diff = snapshot_diff(&label, current.as_deref(), &rendered);
        let path = PathBuf::from(&label);
        let snapshot = if diff.is_some() {
            WriteResult::WouldWrite { path }
        } else {
            WriteResult::Unchanged { path }
        };
        return Ok(ExecutionReport {
            mode,
            applied: Vec::new(),
            snapshot,
            new_baseline,
            snapshot_diff: diff,
        });
    }

    let mut applied = Vec::new();
    for entry in plan.database_entries() {
        let a = &entry.association;
        let result = match entry.direction {
            Direction::AddToDb => store.apply_add(a),
            Direction::RemoveFromDb => store.apply_remove(&a.reference, &a.path),
            Direction::AddToSnapshot | Direction::RemoveFromSnapshot => continue,
        };
        let outcome = result.map_err(|source| SyncError::Apply {
            direction: entry.direction,
            reference: a.reference.clone(),
            path: a.path.clone(),
            source,
        })?;
        tracing::debug!("{} {} -> {}: {outcome:?}", entry.direction, a.reference, a.path);
        applied.push(AppliedEntry {
            entry: entry.clone(),
            outcome,
        });
    }

    let snapshot = snapshot_store.save_baseline(&new_baseline)?;
    Ok(ExecutionReport {
        mode,
        applied,
        snapshot,
        new_baseline,
        snapshot_diff: None,
    })
}
