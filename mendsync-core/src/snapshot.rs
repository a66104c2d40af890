//! Portable text snapshot of an [`AssociationSet`].
//!
//! # Format
//!
//! ```text
//! # mendsync snapshot v1
//! <reference>:::<citation key>:::<file hash>:::<root-relative path>
//! ```
//!
//! `#` lines and blank lines are ignored. A two-field `<reference>:::<path>`
//! line is accepted on load with empty metadata. Output is sorted by
//! reference, then path, with LF line endings.
//!
//! Within a field, `\` escapes `\`, `:` and `#`, and `\n` / `\r` stand for
//! line breaks. Rendering escapes every `:` so no field can contain the
//! separator. A backslash before any other character is kept as written.
//!
//! # Writes
//!
//! [`SnapshotFile::save`] is hash-gated and atomic:
//!
//! 1. Render the set.
//! 2. SHA-256 the rendered text and the current file (if any).
//! 3. Identical → skip, leaving mtime untouched for file-sync tools.
//! 4. Write to `<path>.mendsync.tmp`.
//! 5. Rename over the final path (atomic on POSIX); on failure remove the tmp.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::association::AssociationSet;
use crate::error::{io_err, SnapshotError};
use crate::store::BaselineStore;
use crate::types::{DocPath, FileAssociation, FileHash, FileMeta, ReferenceId};

pub const SEPARATOR: &str = ":::";
pub const HEADER: &str = "# mendsync snapshot v1";
const COMMENT: char = '#';
const ESCAPE: char = '\\';

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of persisting a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// Rendered content matches the file on disk; nothing was written.
    Unchanged { path: PathBuf },
    /// Dry-run: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Parse snapshot text. `origin` is only used for error messages.
pub fn parse(origin: &Path, text: &str) -> Result<AssociationSet, SnapshotError> {
    let mut set = AssociationSet::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with(COMMENT) {
            continue;
        }
        let corrupt = |reason: String| SnapshotError::Corrupt {
            path: origin.to_path_buf(),
            line: idx + 1,
            reason,
        };

        let fields = split_fields(line);
        let (reference, key, hash, path) = match fields.as_slice() {
            [reference, key, hash, path] => (reference, key.as_str(), hash.as_str(), path),
            [reference, path] => (reference, "", "", path),
            other => {
                return Err(corrupt(format!(
                    "expected 4 fields separated by '{SEPARATOR}', found {}",
                    other.len()
                )))
            }
        };

        let reference = reference.trim();
        if reference.is_empty() {
            return Err(corrupt("empty reference id".into()));
        }
        let path = DocPath::parse(path).map_err(|e| corrupt(e.to_string()))?;
        let meta = FileMeta::new(
            non_empty(hash).map(FileHash::from),
            non_empty(key).map(str::to_owned),
        );

        set.try_insert(FileAssociation::new(ReferenceId::from(reference), path).with_meta(meta))
            .map_err(|source| SnapshotError::Malformed {
                path: origin.to_path_buf(),
                source,
            })?;
    }
    Ok(set)
}

/// Render the canonical text form.
pub fn render(set: &AssociationSet) -> String {
    let mut out = String::with_capacity(64 * (set.len() + 1));
    out.push_str(HEADER);
    out.push('\n');
    for assoc in set.iter() {
        let hash = assoc.meta.hash.as_ref().map(|h| h.0.as_str()).unwrap_or("");
        let key = assoc.meta.citation_key.as_deref().unwrap_or("");
        let mut reference = escape_field(&assoc.reference.0);
        if reference.starts_with(COMMENT) {
            reference.insert(0, ESCAPE);
        }
        let fields = [
            reference,
            escape_field(key),
            escape_field(hash),
            escape_field(assoc.path.as_str()),
        ];
        out.push_str(&fields.join(SEPARATOR));
        out.push('\n');
    }
    out
}

fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            ESCAPE | ':' => {
                out.push(ESCAPE);
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Split a line on unescaped separators and unescape each field.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut rest = line;
    while let Some(ch) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(SEPARATOR) {
            fields.push(std::mem::take(&mut current));
            rest = after;
            continue;
        }
        rest = &rest[ch.len_utf8()..];
        if ch != ESCAPE {
            current.push(ch);
            continue;
        }
        let unescaped = match rest.chars().next() {
            Some(c @ (ESCAPE | ':' | COMMENT)) => Some(c),
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            _ => None,
        };
        match unescaped {
            Some(c) => {
                current.push(c);
                rest = &rest[1..];
            }
            None => current.push(ESCAPE),
        }
    }
    fields.push(current);
    fields
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn digest(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// File-backed snapshot
// ---------------------------------------------------------------------------

/// Snapshot stored as a text file at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.mendsync.tmp", self.path.display()))
    }

    /// Read the file, or `None` if it does not exist.
    pub fn read_text(&self) -> Result<Option<String>, SnapshotError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == ErrorKind::InvalidData => Err(SnapshotError::Corrupt {
                path: self.path.clone(),
                line: 0,
                reason: "file is not valid UTF-8".into(),
            }),
            Err(err) => Err(io_err(&self.path, err)),
        }
    }

    /// Load the set. A missing file is [`SnapshotError::Missing`].
    pub fn load(&self) -> Result<AssociationSet, SnapshotError> {
        let text = self.read_text()?.ok_or_else(|| SnapshotError::Missing {
            path: self.path.clone(),
        })?;
        parse(&self.path, &text)
    }

    /// Persist `set`, skipping the write when the file already holds the same text.
    pub fn save(&self, set: &AssociationSet, dry_run: bool) -> Result<WriteResult, SnapshotError> {
        self.save_with_tmp(set, dry_run, &self.tmp_path())
    }

    fn save_with_tmp(
        &self,
        set: &AssociationSet,
        dry_run: bool,
        tmp: &Path,
    ) -> Result<WriteResult, SnapshotError> {
        let rendered = render(set);
        let path = self.path.clone();

        if let Some(existing) = self.read_text().ok().flatten() {
            if digest(&existing.replace("\r\n", "\n")) == digest(&rendered) {
                tracing::debug!("snapshot unchanged: {}", path.display());
                return Ok(WriteResult::Unchanged { path });
            }
        }

        if dry_run {
            tracing::info!("[dry-run] would write snapshot: {}", path.display());
            return Ok(WriteResult::WouldWrite { path });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::write(tmp, &rendered).map_err(|e| io_err(tmp, e))?;
        if let Err(e) = std::fs::rename(tmp, &path) {
            let _ = std::fs::remove_file(tmp);
            return Err(io_err(&path, e));
        }

        tracing::info!("wrote snapshot: {} ({} associations)", path.display(), set.len());
        Ok(WriteResult::Written { path })
    }
}

impl BaselineStore for SnapshotFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_baseline(&self) -> Result<AssociationSet, SnapshotError> {
        self.load()
    }

    fn current_text(&self) -> Result<Option<String>, SnapshotError> {
        self.read_text()
    }

    fn save_baseline(&mut self, set: &AssociationSet) -> Result<WriteResult, SnapshotError> {
        self.save(set, false)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn sample() -> AssociationSet {
        let mut set = AssociationSet::new();
        set.insert(
            FileAssociation::new("{uuid-b}", DocPath::parse("b.pdf").unwrap()).with_meta(
                FileMeta::new(Some(FileHash::from("bbbb")), Some("Jones2020".into())),
            ),
        );
        set.insert(FileAssociation::new("{uuid-a}", DocPath::parse("dir/a.pdf").unwrap()));
        set
    }

    #[test]
    fn render_is_sorted_with_header() {
        let text = render(&sample());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "{uuid-a}:::::::::dir/a.pdf");
        assert_eq!(lines[2], "{uuid-b}:::Jones2020:::bbbb:::b.pdf");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn parse_reads_back_rendered_metadata() {
        let parsed = parse(Path::new("mem"), &render(&sample())).unwrap();
        assert_eq!(parsed, sample());
        let meta = parsed
            .get(&ReferenceId::from("{uuid-b}"), &DocPath::parse("b.pdf").unwrap())
            .unwrap();
        assert_eq!(meta.hash, Some(FileHash::from("bbbb")));
        assert_eq!(meta.citation_key.as_deref(), Some("Jones2020"));
    }

    #[test]
    fn escaped_colons_do_not_shift_fields() {
        let set = parse(Path::new("mem"), "ref1:::Smith\\::::h1:::a.pdf\n").unwrap();
        let meta = set
            .get(&ReferenceId::from("ref1"), &DocPath::parse("a.pdf").unwrap())
            .unwrap();
        assert_eq!(meta.citation_key.as_deref(), Some("Smith:"));
        assert_eq!(meta.hash, Some(FileHash::from("h1")));

        assert_eq!(split_fields("a\\:\\:\\:b:::c"), ["a:::b", "c"]);
        assert_eq!(split_fields("\\#r:::x\\ny"), ["#r", "x\ny"]);
    }

    #[test]
    fn parse_accepts_two_field_lines_comments_and_crlf() {
        let text = "# comment\r\n\r\nref1:::a.pdf\r\n   \n# another\nref2:::K:::h:::b.pdf\n";
        let set = parse(Path::new("mem"), text).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&ReferenceId::from("ref1"), &DocPath::parse("a.pdf").unwrap()));
    }

    #[test]
    fn parse_reports_line_number_of_corruption() {
        let text = "ref1:::a.pdf\nthis line is garbage\n";
        let err = parse(Path::new("snap.dat"), text).unwrap_err();
        match err {
            SnapshotError::Corrupt { line, path, .. } => {
                assert_eq!(line, 2);
                assert_eq!(path, PathBuf::from("snap.dat"));
            }
            other => panic!("expected Corrupt, got {other}"),
        }
    }

    #[test]
    fn parse_rejects_escaping_path_and_empty_reference() {
        assert!(matches!(
            parse(Path::new("s"), "ref:::../x.pdf\n").unwrap_err(),
            SnapshotError::Corrupt { line: 1, .. }
        ));
        assert!(matches!(
            parse(Path::new("s"), " :::x.pdf\n").unwrap_err(),
            SnapshotError::Corrupt { line: 1, .. }
        ));
    }

    #[test]
    fn parse_duplicate_is_malformed() {
        let err = parse(Path::new("s"), "r:::a.pdf\nr:::k:::h:::a.pdf\n").unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed { .. }), "got: {err}");
    }

    #[test]
    fn load_missing_file_is_missing_error() {
        let tmp = TempDir::new().unwrap();
        let err = SnapshotFile::new(tmp.path().join("nope.dat")).load().unwrap_err();
        assert!(matches!(err, SnapshotError::Missing { .. }));
    }

    #[test]
    fn save_then_load_and_unchanged_on_second_save() {
        let tmp = TempDir::new().unwrap();
        let file = SnapshotFile::new(tmp.path().join("files.dat"));

        let first = file.save(&sample(), false).unwrap();
        assert!(matches!(first, WriteResult::Written { .. }));
        assert_eq!(file.load().unwrap(), sample());

        let second = file.save(&sample(), false).unwrap();
        assert!(matches!(second, WriteResult::Unchanged { .. }));
    }

    #[test]
    fn dry_run_save_does_not_create_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("files.dat");
        let result = SnapshotFile::new(&path).save(&sample(), true).unwrap();
        assert!(matches!(result, WriteResult::WouldWrite { .. }));
        assert!(!path.exists(), "dry-run must not create the snapshot");
    }

    #[test]
    fn tmp_file_removed_after_save() {
        let tmp = TempDir::new().unwrap();
        let file = SnapshotFile::new(tmp.path().join("files.dat"));
        file.save(&sample(), false).unwrap();
        assert!(!file.tmp_path().exists(), ".mendsync.tmp must be cleaned up");
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("files.dat");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();
        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let path = readonly_dir.join("files.dat");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("files.dat.mendsync.tmp");

        let result = SnapshotFile::new(&path).save_with_tmp(&sample(), false, &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Running as root ignores directory permissions; only assert on failure.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists(), ".mendsync.tmp should be cleaned up");
        }
    }
}
