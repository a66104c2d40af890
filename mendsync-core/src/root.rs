//! The configured document root and the single normalization point for paths.
//!
//! The catalog stores file locations as `file://` URLs, the snapshot stores
//! root-relative paths, and the filesystem probe needs absolute paths. Every
//! conversion between those forms goes through [`DocumentRoot`].

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::CoreError;
use crate::types::DocPath;

/// Result of normalizing a location recorded by one of the stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Inside the document root.
    Inside(DocPath),
    /// Resolves somewhere outside the root; such files are not synchronized.
    Outside(PathBuf),
}

/// Absolute directory that all synchronized files live under.
///
/// `dir` is kept as given (made absolute, not symlink-resolved) because the
/// catalog records URLs under the path the user works with. When `dir` is a
/// symlink, locations under its target are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRoot {
    dir: PathBuf,
    resolved: Option<PathBuf>,
}

impl DocumentRoot {
    /// Use `dir` as the root. The path must be absolute; it is not required to
    /// exist, so tests can use synthetic roots.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = dir.into();
        if !dir.is_absolute() {
            return Err(CoreError::InvalidRoot {
                path: dir,
                reason: "document root must be an absolute path".into(),
            });
        }
        Ok(Self {
            dir: lexical_clean(&dir),
            resolved: None,
        })
    }

    /// Use an existing directory as the root.
    ///
    /// Relative paths are made absolute against the working directory without
    /// following symlinks.
    pub fn resolve(dir: &Path) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidRoot {
            path: dir.to_path_buf(),
            reason,
        };
        let absolute = std::path::absolute(dir).map_err(|e| invalid(e.to_string()))?;
        let canonical = absolute.canonicalize().map_err(|e| invalid(e.to_string()))?;
        if !canonical.is_dir() {
            return Err(invalid("not a directory".into()));
        }

        let mut root = Self::new(absolute)?;
        if canonical != root.dir {
            root.resolved = Some(canonical);
        }
        Ok(root)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute filesystem location of `path`.
    pub fn absolute(&self, path: &DocPath) -> PathBuf {
        let mut out = self.dir.clone();
        out.extend(path.components());
        out
    }

    /// `file://` URL for `path`, percent-encoded.
    pub fn to_url(&self, path: &DocPath) -> Result<Url, CoreError> {
        let abs = self.absolute(path);
        Url::from_file_path(&abs).map_err(|()| CoreError::InvalidPath {
            raw: abs.display().to_string(),
            reason: "cannot be expressed as a file URL".into(),
        })
    }

    /// Normalize a location in any of the accepted forms: a `file://` URL, an
    /// absolute path, or a path relative to the root.
    pub fn locate(&self, raw: &str) -> Result<Located, CoreError> {
        let trimmed = raw.trim();
        if trimmed.starts_with("file:") {
            let url = Url::parse(trimmed).map_err(|e| CoreError::InvalidPath {
                raw: raw.to_string(),
                reason: e.to_string(),
            })?;
            let path = url.to_file_path().map_err(|()| CoreError::InvalidPath {
                raw: raw.to_string(),
                reason: "URL does not name a local file".into(),
            })?;
            return self.locate_absolute(&path);
        }

        let as_path = Path::new(trimmed);
        if as_path.is_absolute() {
            return self.locate_absolute(as_path);
        }
        DocPath::parse(trimmed).map(Located::Inside)
    }

    fn locate_absolute(&self, path: &Path) -> Result<Located, CoreError> {
        let cleaned = lexical_clean(path);
        let rel = std::iter::once(&self.dir)
            .chain(self.resolved.as_ref())
            .find_map(|base| cleaned.strip_prefix(base).ok());
        match rel {
            Some(rel) if !rel.as_os_str().is_empty() => {
                DocPath::parse(&rel.to_string_lossy()).map(Located::Inside)
            }
            _ => Ok(Located::Outside(cleaned)),
        }
    }
}

/// Drop `.` components and resolve `..` lexically, without touching the disk.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn root() -> DocumentRoot {
        DocumentRoot::new("/home/me/Papers").unwrap()
    }

    fn inside(s: &str) -> Located {
        Located::Inside(DocPath::parse(s).unwrap())
    }

    #[test]
    fn relative_root_is_rejected() {
        let err = DocumentRoot::new("Papers").unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoot { .. }));
    }

    #[test]
    fn file_url_inside_root_becomes_relative() {
        let got = root()
            .locate("file:///home/me/Papers/2019/Smith%20et%20al.pdf")
            .unwrap();
        assert_eq!(got, inside("2019/Smith et al.pdf"));
    }

    #[test]
    fn absolute_path_inside_root_becomes_relative() {
        let got = root().locate("/home/me/Papers/./a/../b.pdf").unwrap();
        assert_eq!(got, inside("b.pdf"));
    }

    #[test]
    fn outside_root_is_reported() {
        let got = root().locate("file:///tmp/other.pdf").unwrap();
        assert_eq!(got, Located::Outside(PathBuf::from("/tmp/other.pdf")));

        // A sibling directory sharing a name prefix is still outside.
        let got = root().locate("/home/me/PapersOld/x.pdf").unwrap();
        assert!(matches!(got, Located::Outside(_)));

        let got = root().locate("/home/me/Papers").unwrap();
        assert!(matches!(got, Located::Outside(_)));
    }

    #[test]
    fn relative_input_is_canonicalized() {
        assert_eq!(root().locate("dir\\x.pdf").unwrap(), inside("dir/x.pdf"));
    }

    #[test]
    fn url_round_trips_through_locate() {
        let r = root();
        let path = DocPath::parse("née/a b#1.pdf").unwrap();
        let url = r.to_url(&path).unwrap();
        assert!(url.as_str().starts_with("file:///home/me/Papers/"));
        assert!(url.as_str().contains("a%20b%231.pdf"));
        assert_eq!(r.locate(url.as_str()).unwrap(), Located::Inside(path));
    }

    #[test]
    fn symlinked_root_keeps_given_path_and_accepts_target() {
        let tmp = tempfile::TempDir::new().unwrap();
        let real = tmp.path().join("real");
        std::fs::create_dir_all(&real).unwrap();
        let link = tmp.path().join("Papers");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let r = DocumentRoot::resolve(&link).unwrap();
        assert_eq!(r.dir(), link.as_path());

        let via_link = Url::from_file_path(link.join("a.pdf")).unwrap();
        assert_eq!(r.locate(via_link.as_str()).unwrap(), inside("a.pdf"));
        let via_target = real.canonicalize().unwrap().join("sub/b.pdf");
        assert_eq!(
            r.locate(&via_target.to_string_lossy()).unwrap(),
            inside("sub/b.pdf")
        );
        assert!(r.to_url(&DocPath::parse("a.pdf").unwrap()).unwrap().as_str().contains("/Papers/"));
    }

    #[test]
    fn resolve_rejects_files_and_missing_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, b"").unwrap();
        assert!(DocumentRoot::resolve(&file).is_err());
        assert!(DocumentRoot::resolve(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn absolute_joins_components() {
        let p = DocPath::parse("x/y.pdf").unwrap();
        assert_eq!(root().absolute(&p), PathBuf::from("/home/me/Papers/x/y.pdf"));
    }
}
