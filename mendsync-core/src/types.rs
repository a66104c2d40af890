//! Domain types shared by the catalog adapter, the snapshot codec and the
//! reconciliation engine.
//!
//! Identity of an association is always the `(ReferenceId, DocPath)` pair.
//! [`FileMeta`] rides along but never participates in comparisons.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier of a bibliographic reference (the catalog's document uuid).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(pub String);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ReferenceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReferenceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Content hash the catalog uses as the primary key of a file row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHash(pub String);

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FileHash {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A document-root-relative file path in canonical form.
///
/// Canonical means `/`-separated, no leading `/`, and no empty, `.` or `..`
/// components. Backslashes are treated as separators so paths recorded on
/// Windows compare equal to the same path recorded elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocPath(String);

impl DocPath {
    /// Parse a relative path into canonical form.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidPath {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let unified = raw.trim().replace('\\', "/");
        if unified.is_empty() {
            return Err(invalid("path is empty"));
        }
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(invalid("path must be relative to the document root"));
        }

        let mut parts = Vec::new();
        for part in unified.split('/') {
            match part {
                "" | "." => continue,
                ".." => return Err(invalid("path escapes the document root")),
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            return Err(invalid("path has no file component"));
        }
        Ok(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path components in order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for DocPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DocPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

// ---------------------------------------------------------------------------
// Associations
// ---------------------------------------------------------------------------

/// Non-identity data recorded alongside an association.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<FileHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_key: Option<String>,
}

impl FileMeta {
    pub fn new(hash: Option<FileHash>, citation_key: Option<String>) -> Self {
        Self { hash, citation_key }
    }
}

/// "This file is linked to this reference."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAssociation {
    pub reference: ReferenceId,
    pub path: DocPath,
    #[serde(default)]
    pub meta: FileMeta,
}

impl FileAssociation {
    pub fn new(reference: impl Into<ReferenceId>, path: DocPath) -> Self {
        Self {
            reference: reference.into(),
            path,
            meta: FileMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: FileMeta) -> Self {
        self.meta = meta;
        self
    }

    /// The identity key of this association.
    pub fn key(&self) -> (&ReferenceId, &DocPath) {
        (&self.reference, &self.path)
    }
}
