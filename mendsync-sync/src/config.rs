//! Run configuration, built once by the caller and threaded through the run.

use std::path::{Path, PathBuf};

use mendsync_core::{DocumentRoot, StoreError};

use crate::error::SyncError;
use crate::executor::Mode;

/// Everything one sync run needs to know.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The Mendeley Desktop SQLite catalog.
    pub database: PathBuf,
    /// The portable snapshot file.
    pub snapshot: PathBuf,
    /// Directory holding the synchronized files.
    pub root: DocumentRoot,
    pub mode: Mode,
}

impl SyncConfig {
    /// Validate paths: the catalog must be an existing file and the root an
    /// existing directory. The snapshot may not exist yet.
    pub fn new(
        database: &Path,
        snapshot: &Path,
        file_root: &Path,
        mode: Mode,
    ) -> Result<Self, SyncError> {
        if !database.is_file() {
            return Err(SyncError::Store(StoreError::Unavailable {
                store: database.display().to_string(),
                reason: "file does not exist".into(),
            }));
        }
        let root = DocumentRoot::resolve(file_root)?;
        Ok(Self {
            database: database.to_path_buf(),
            snapshot: snapshot.to_path_buf(),
            root,
            mode,
        })
    }
}
