//! Error types for mendsync-sync.

use thiserror::Error;

use mendsync_core::{CoreError, DocPath, ReferenceId, SnapshotError, StoreError};
use mendsync_store::DbError;

use crate::plan::Direction;

/// All errors that can abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The catalog could not be opened, read or written.
    #[error("catalog error: {0}")]
    Store(#[from] StoreError),

    /// The snapshot could not be read or written.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The run configuration is unusable.
    #[error("configuration error: {0}")]
    Config(#[from] CoreError),

    /// A catalog mutation failed part-way through the plan.
    #[error(
        "failed to apply {direction} {reference} -> {path}: {source}; \
         remaining changes were not applied and the snapshot was not updated"
    )]
    Apply {
        direction: Direction,
        reference: ReferenceId,
        path: DocPath,
        #[source]
        source: StoreError,
    },
}

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        SyncError::Store(err.into())
    }
}
