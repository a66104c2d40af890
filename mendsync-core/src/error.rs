//! Error types for mendsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{DocPath, ReferenceId};

/// Errors raised while building domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The same (reference, path) pair appeared twice in one association set.
    #[error("malformed input: duplicate association {reference} -> {path}")]
    MalformedInput {
        reference: ReferenceId,
        path: DocPath,
    },

    /// A path could not be brought into canonical root-relative form.
    #[error("invalid document path '{raw}': {reason}")]
    InvalidPath { raw: String, reason: String },

    /// The configured document root is unusable.
    #[error("invalid document root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

/// Errors raised by the snapshot codec.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot file exists yet. Callers treat this as an empty baseline.
    #[error("snapshot not found at {path}")]
    Missing { path: PathBuf },

    /// The file exists but a line does not parse.
    #[error(
        "snapshot {path} is corrupt at line {line}: {reason}; inspect or restore the file before syncing again"
    )]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The file parsed but repeats an association.
    #[error("snapshot {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by an [`AssociationStore`](crate::store::AssociationStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be opened, queried or written. Fatal for the run.
    #[error("store unavailable ({store}): {reason}")]
    Unavailable { store: String, reason: String },

    /// The store returned data that violates the association invariants.
    #[error("store {store} returned malformed data: {source}")]
    Malformed {
        store: String,
        #[source]
        source: CoreError,
    },
}

/// Convenience constructor for [`SnapshotError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.into(),
        source,
    }
}
