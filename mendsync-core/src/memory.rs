//! In-memory stores for exercising the engine without SQLite or a filesystem.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::association::AssociationSet;
use crate::error::{SnapshotError, StoreError};
use crate::snapshot::{self, WriteResult};
use crate::store::{ApplyOutcome, AssociationStore, BaselineStore};
use crate::types::{DocPath, FileAssociation, ReferenceId};

/// Catalog fake. Counts mutations and can be told to fail on one pair.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub set: AssociationSet,
    /// When set, only these references are known; adds for others are skipped.
    pub known_references: Option<BTreeSet<ReferenceId>>,
    /// Fail with [`StoreError::Unavailable`] when asked to touch this pair.
    pub fail_on: Option<(ReferenceId, DocPath)>,
    /// Refuse every read.
    pub unavailable: bool,
    pub writes: usize,
}

impl MemoryStore {
    pub fn new(set: AssociationSet) -> Self {
        Self {
            set,
            ..Self::default()
        }
    }

    fn check(&self, reference: &ReferenceId, path: &DocPath) -> Result<(), StoreError> {
        match &self.fail_on {
            Some((r, p)) if r == reference && p == path => Err(StoreError::Unavailable {
                store: self.describe(),
                reason: format!("injected failure for {reference} -> {path}"),
            }),
            _ => Ok(()),
        }
    }
}

impl AssociationStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn current_associations(&self) -> Result<AssociationSet, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable {
                store: self.describe(),
                reason: "locked".into(),
            });
        }
        Ok(self.set.clone())
    }

    fn apply_add(&mut self, assoc: &FileAssociation) -> Result<ApplyOutcome, StoreError> {
        self.check(&assoc.reference, &assoc.path)?;
        if let Some(known) = &self.known_references {
            if !known.contains(&assoc.reference) {
                return Ok(ApplyOutcome::Skipped {
                    reason: format!("no reference {}", assoc.reference),
                });
            }
        }
        if self.set.insert(assoc.clone()) {
            self.writes += 1;
            Ok(ApplyOutcome::Applied)
        } else {
            Ok(ApplyOutcome::AlreadyPresent)
        }
    }

    fn apply_remove(
        &mut self,
        reference: &ReferenceId,
        path: &DocPath,
    ) -> Result<ApplyOutcome, StoreError> {
        self.check(reference, path)?;
        if self.set.remove(reference, path) {
            self.writes += 1;
            Ok(ApplyOutcome::Applied)
        } else {
            Ok(ApplyOutcome::AlreadyAbsent)
        }
    }
}

/// Snapshot fake holding rendered text, so previews behave like the file.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    pub text: Option<String>,
    pub saves: usize,
}

impl MemorySnapshot {
    /// A snapshot that does not exist yet.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_set(set: &AssociationSet) -> Self {
        Self {
            text: Some(snapshot::render(set)),
            saves: 0,
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            saves: 0,
        }
    }

    fn origin(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

impl BaselineStore for MemorySnapshot {
    fn describe(&self) -> String {
        "<memory>".to_string()
    }

    fn load_baseline(&self) -> Result<AssociationSet, SnapshotError> {
        match &self.text {
            Some(text) => snapshot::parse(&self.origin(), text),
            None => Err(SnapshotError::Missing {
                path: self.origin(),
            }),
        }
    }

    fn current_text(&self) -> Result<Option<String>, SnapshotError> {
        Ok(self.text.clone())
    }

    fn save_baseline(&mut self, set: &AssociationSet) -> Result<WriteResult, SnapshotError> {
        let rendered = snapshot::render(set);
        if self.text.as_deref() == Some(rendered.as_str()) {
            return Ok(WriteResult::Unchanged {
                path: self.origin(),
            });
        }
        self.text = Some(rendered);
        self.saves += 1;
        Ok(WriteResult::Written {
            path: self.origin(),
        })
    }
}
