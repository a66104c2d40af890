//! Capability traits for the two stores being reconciled.
//!
//! The engine never talks to SQLite or the filesystem directly; it sees the
//! catalog through [`AssociationStore`] and the snapshot through
//! [`BaselineStore`]. In-memory implementations live in [`crate::memory`].

use serde::Serialize;

use crate::association::AssociationSet;
use crate::error::{SnapshotError, StoreError};
use crate::snapshot::WriteResult;
use crate::types::{DocPath, FileAssociation, ReferenceId};

/// What a single idempotent store mutation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The store changed.
    Applied,
    /// Add of an association the store already had.
    AlreadyPresent,
    /// Remove of an association the store did not have.
    AlreadyAbsent,
    /// The store declined the change for a non-fatal reason.
    Skipped { reason: String },
}

/// The reference manager's catalog.
pub trait AssociationStore {
    /// Human-readable name for messages (usually the database path).
    fn describe(&self) -> String;

    /// Every reference-to-file link presently stored.
    fn current_associations(&self) -> Result<AssociationSet, StoreError>;

    /// Link a file to a reference. Adding an existing link is a no-op.
    fn apply_add(&mut self, assoc: &FileAssociation) -> Result<ApplyOutcome, StoreError>;

    /// Unlink a file from a reference. Removing an absent link is a no-op.
    fn apply_remove(
        &mut self,
        reference: &ReferenceId,
        path: &DocPath,
    ) -> Result<ApplyOutcome, StoreError>;
}

/// The portable snapshot recording the last agreed baseline.
pub trait BaselineStore {
    fn describe(&self) -> String;

    /// Load the baseline; [`SnapshotError::Missing`] when none exists yet.
    fn load_baseline(&self) -> Result<AssociationSet, SnapshotError>;

    /// Raw stored text, for previews. `None` when no snapshot exists.
    fn current_text(&self) -> Result<Option<String>, SnapshotError>;

    /// Replace the baseline.
    fn save_baseline(&mut self, set: &AssociationSet) -> Result<WriteResult, SnapshotError>;
}
