//! [`MendeleyDb`]: the catalog side of the reconciliation.
//!
//! Locations in the catalog are absolute `file://` URLs. Every URL read is
//! normalized through the configured [`DocumentRoot`]; files outside the root
//! or without a local copy are invisible to the sync.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};

use mendsync_core::{
    ApplyOutcome, AssociationSet, AssociationStore, DocPath, DocumentRoot, FileAssociation,
    FileHash, FileMeta, Located, ReferenceId, StoreError,
};

use crate::error::{sql_err, DbError};
use crate::schema;

/// How the catalog file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    /// Used for dry runs; SQLite itself rejects any write.
    ReadOnly,
}

pub struct MendeleyDb {
    conn: Connection,
    path: PathBuf,
    root: DocumentRoot,
}

impl MendeleyDb {
    /// Open an existing catalog and check that the link tables are present.
    pub fn open(path: &Path, root: DocumentRoot, mode: AccessMode) -> Result<Self, DbError> {
        if !path.is_file() {
            return Err(DbError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let flags = match mode {
            AccessMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            AccessMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        } | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(path, flags).map_err(|e| sql_err(path, e))?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
            root,
        };
        db.verify_schema()?;
        tracing::debug!("opened catalog {} ({mode:?})", path.display());
        Ok(db)
    }

    fn verify_schema(&self) -> Result<(), DbError> {
        for table in schema::REQUIRED_TABLES {
            let found: Option<i64> = self
                .conn
                .query_row(schema::SELECT_TABLE_EXISTS, params![table], |row| row.get(0))
                .optional()
                .map_err(|e| sql_err(&self.path, e))?;
            if found.is_none() {
                return Err(DbError::Schema {
                    path: self.path.clone(),
                    table: table.to_string(),
                });
            }
        }
        Ok(())
    }

    /// All links whose file lives under the document root.
    pub fn associations(&self) -> Result<AssociationSet, DbError> {
        let mut stmt = self
            .conn
            .prepare(schema::SELECT_ASSOCIATIONS)
            .map_err(|e| sql_err(&self.path, e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| sql_err(&self.path, e))?;

        let mut set = AssociationSet::new();
        for row in rows {
            let (uuid, citation_key, hash, local_url) = row.map_err(|e| sql_err(&self.path, e))?;
            let Some(uuid) = uuid.filter(|u| !u.is_empty()) else {
                tracing::warn!("file {hash} is linked to a document without uuid; ignored");
                continue;
            };
            // Files that were never downloaded have no local location.
            let Some(local_url) = local_url.filter(|u| !u.is_empty()) else {
                continue;
            };
            let path = match self.root.locate(&local_url) {
                Ok(Located::Inside(path)) => path,
                Ok(Located::Outside(abs)) => {
                    tracing::debug!("outside document root, ignored: {}", abs.display());
                    continue;
                }
                Err(err) => {
                    tracing::warn!("unusable file location for {uuid}: {err}");
                    continue;
                }
            };
            let meta = FileMeta::new(
                Some(FileHash(hash)),
                citation_key.filter(|k| !k.is_empty()),
            );
            set.try_insert(FileAssociation::new(ReferenceId(uuid), path).with_meta(meta))?;
        }
        Ok(set)
    }

    /// Link `assoc` in one transaction. Never relocates an existing file row.
    pub fn add(&mut self, assoc: &FileAssociation) -> Result<ApplyOutcome, DbError> {
        let Some(hash) = assoc.meta.hash.clone() else {
            return Ok(skipped(format!(
                "no file hash recorded for {}; cannot register it in the catalog",
                assoc.path
            )));
        };
        let url = self.root.to_url(&assoc.path)?;
        let path = self.path.clone();
        let root = self.root.clone();

        let tx = self.conn.transaction().map_err(|e| sql_err(&path, e))?;
        let Some(document_id) = find_document_id(&tx, &assoc.reference).map_err(|e| sql_err(&path, e))?
        else {
            return Ok(skipped(format!(
                "no document {} for file {}; synchronise the Mendeley Desktop client first",
                assoc.reference, assoc.path
            )));
        };

        let existing_url: Option<String> = tx
            .query_row(schema::SELECT_FILE_URL, params![hash.0], |row| row.get(0))
            .optional()
            .map_err(|e| sql_err(&path, e))?;
        match existing_url {
            None => {
                tx.execute(schema::INSERT_FILE, params![hash.0, url.as_str()])
                    .map_err(|e| sql_err(&path, e))?;
            }
            Some(existing) => {
                if !same_location(&root, &existing, &assoc.path) {
                    return Ok(skipped(format!(
                        "file hash {hash} is already registered at {existing}"
                    )));
                }
            }
        }

        if linked_hashes(&tx, &root, document_id, &assoc.path)
            .map_err(|e| sql_err(&path, e))?
            .contains(&hash.0)
        {
            return Ok(ApplyOutcome::AlreadyPresent);
        }
        tx.execute(schema::INSERT_DOCUMENT_FILE, params![document_id, hash.0])
            .map_err(|e| sql_err(&path, e))?;
        tx.commit().map_err(|e| sql_err(&path, e))?;

        tracing::info!("linked {} -> {}", assoc.reference, assoc.path);
        Ok(ApplyOutcome::Applied)
    }

    /// Unlink every file row of `reference` located at `doc_path`.
    pub fn remove(
        &mut self,
        reference: &ReferenceId,
        doc_path: &DocPath,
    ) -> Result<ApplyOutcome, DbError> {
        let path = self.path.clone();
        let root = self.root.clone();

        let tx = self.conn.transaction().map_err(|e| sql_err(&path, e))?;
        let Some(document_id) = find_document_id(&tx, reference).map_err(|e| sql_err(&path, e))? else {
            return Ok(ApplyOutcome::AlreadyAbsent);
        };
        let hashes =
            linked_hashes(&tx, &root, document_id, doc_path).map_err(|e| sql_err(&path, e))?;
        if hashes.is_empty() {
            return Ok(ApplyOutcome::AlreadyAbsent);
        }
        for hash in &hashes {
            tx.execute(schema::DELETE_DOCUMENT_FILE, params![document_id, hash])
                .map_err(|e| sql_err(&path, e))?;
        }
        tx.commit().map_err(|e| sql_err(&path, e))?;

        tracing::info!("unlinked {reference} -> {doc_path}");
        Ok(ApplyOutcome::Applied)
    }
}

impl AssociationStore for MendeleyDb {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn current_associations(&self) -> Result<AssociationSet, StoreError> {
        Ok(self.associations()?)
    }

    fn apply_add(&mut self, assoc: &FileAssociation) -> Result<ApplyOutcome, StoreError> {
        let outcome = self.add(assoc)?;
        if let ApplyOutcome::Skipped { reason } = &outcome {
            tracing::warn!("{reason}");
        }
        Ok(outcome)
    }

    fn apply_remove(
        &mut self,
        reference: &ReferenceId,
        path: &DocPath,
    ) -> Result<ApplyOutcome, StoreError> {
        Ok(self.remove(reference, path)?)
    }
}

fn skipped(reason: String) -> ApplyOutcome {
    ApplyOutcome::Skipped { reason }
}

fn same_location(root: &DocumentRoot, raw: &str, path: &DocPath) -> bool {
    matches!(root.locate(raw), Ok(Located::Inside(ref p)) if p == path)
}

fn find_document_id(tx: &Transaction<'_>, reference: &ReferenceId) -> rusqlite::Result<Option<i64>> {
    tx.query_row(schema::SELECT_DOCUMENT_ID, params![reference.0], |row| row.get(0))
        .optional()
}

/// Hashes linked to `document_id` whose file resolves to `doc_path`.
fn linked_hashes(
    tx: &Transaction<'_>,
    root: &DocumentRoot,
    document_id: i64,
    doc_path: &DocPath,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = tx.prepare(schema::SELECT_LINKED_FILES)?;
    let rows = stmt.query_map(params![document_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (hash, url) = row?;
        if url.is_some_and(|u| same_location(root, &u, doc_path)) {
            out.push(hash);
        }
    }
    Ok(out)
}
