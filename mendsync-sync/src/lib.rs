//! # mendsync-sync
//!
//! Three-way reconciliation of reference-to-file links between the Mendeley
//! catalog and a portable snapshot file.
//!
//! Call [`pipeline::run`] with a [`SyncConfig`] for the real stores, or
//! [`pipeline::run_with`] to drive the engine against any
//! [`AssociationStore`](mendsync_core::AssociationStore) /
//! [`BaselineStore`](mendsync_core::BaselineStore) pair.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod plan;
pub mod probe;

pub use config::SyncConfig;
pub use engine::{next_baseline, reconcile};
pub use error::SyncError;
pub use executor::{execute, AppliedEntry, ExecutionReport, Mode};
pub use pipeline::{run, run_with, SyncOutcome};
pub use plan::{
    Advisory, AdvisoryKind, ChangeEntry, ChangePlan, Conflict, ConflictKind, Direction, Reason,
    Target,
};
pub use probe::{FileProbe, RootProbe};
