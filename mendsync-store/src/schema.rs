//! Mendeley Desktop catalog schema, as far as file links are concerned.
//!
//! ```text
//! Documents(id INTEGER PRIMARY KEY, uuid, citationKey, ...)
//! Files(hash PRIMARY KEY, localUrl)
//! DocumentFiles(documentId, hash, remoteUrl, unlinked, downloadRestricted, ...)
//! ```
//!
//! These names are owned by the host application and may change between its
//! releases.

pub const DOCUMENTS: &str = "Documents";
pub const FILES: &str = "Files";
pub const DOCUMENT_FILES: &str = "DocumentFiles";

/// Tables that must exist before the adapter touches the catalog.
pub const REQUIRED_TABLES: [&str; 3] = [DOCUMENTS, FILES, DOCUMENT_FILES];

pub(crate) const SELECT_TABLE_EXISTS: &str =
    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1";

pub(crate) const SELECT_ASSOCIATIONS: &str = "\
    SELECT d.uuid, d.citationKey, f.hash, f.localUrl \
    FROM DocumentFiles df \
    JOIN Documents d ON d.id = df.documentId \
    JOIN Files f ON f.hash = df.hash";

pub(crate) const SELECT_DOCUMENT_ID: &str = "SELECT id FROM Documents WHERE uuid = ?1";

pub(crate) const SELECT_FILE_URL: &str = "SELECT localUrl FROM Files WHERE hash = ?1";

pub(crate) const SELECT_LINKED_FILES: &str = "\
    SELECT df.hash, f.localUrl \
    FROM DocumentFiles df \
    JOIN Files f ON f.hash = df.hash \
    WHERE df.documentId = ?1";

pub(crate) const INSERT_FILE: &str = "INSERT INTO Files (hash, localUrl) VALUES (?1, ?2)";

pub(crate) const INSERT_DOCUMENT_FILE: &str = "\
    INSERT INTO DocumentFiles (documentId, hash, remoteUrl, unlinked, downloadRestricted) \
    VALUES (?1, ?2, '', 'false', 'false')";

pub(crate) const DELETE_DOCUMENT_FILE: &str =
    "DELETE FROM DocumentFiles WHERE documentId = ?1 AND hash = ?2";
