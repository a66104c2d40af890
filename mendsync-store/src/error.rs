//! Error types for mendsync-store.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

use mendsync_core::{CoreError, StoreError};

/// All errors that can arise from catalog operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database not found at {path}")]
    NotFound { path: PathBuf },

    /// The host application holds a lock on the catalog.
    #[error("database {path} is locked; close Mendeley Desktop and retry")]
    Locked { path: PathBuf },

    /// The file opened but is not a catalog this adapter understands.
    #[error("database {path} does not look like a Mendeley catalog: missing table {table}")]
    Schema { path: PathBuf, table: String },

    /// Any other SQLite failure, with annotated path for context.
    #[error("SQLite error at {path}: {source}")]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DbError {
    fn path(&self) -> Option<&PathBuf> {
        match self {
            DbError::NotFound { path }
            | DbError::Locked { path }
            | DbError::Schema { path, .. }
            | DbError::Sqlite { path, .. } => Some(path),
            DbError::Core(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        let store = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "mendeley".to_string());
        match err {
            DbError::Core(source @ CoreError::MalformedInput { .. }) => {
                StoreError::Malformed { store, source }
            }
            other => StoreError::Unavailable {
                store,
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience constructor that classifies busy/locked failures.
pub(crate) fn sql_err(path: impl Into<PathBuf>, source: rusqlite::Error) -> DbError {
    let path = path.into();
    match source.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => DbError::Locked { path },
        _ => DbError::Sqlite { path, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mendsync_core::DocPath;

    #[test]
    fn locked_maps_to_unavailable() {
        let err: StoreError = DbError::Locked {
            path: PathBuf::from("/tmp/m.sqlite"),
        }
        .into();
        match err {
            StoreError::Unavailable { store, reason } => {
                assert_eq!(store, "/tmp/m.sqlite");
                assert!(reason.contains("locked"));
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn duplicate_maps_to_malformed() {
        let err: StoreError = DbError::Core(CoreError::MalformedInput {
            reference: "r".into(),
            path: DocPath::parse("a.pdf").unwrap(),
        })
        .into();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn busy_sqlite_failure_is_classified_as_locked() {
        let source = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(sql_err("/x", source), DbError::Locked { .. }));
    }
}
