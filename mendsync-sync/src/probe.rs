//! Filesystem existence checks, restricted to the document root.

use mendsync_core::{DocPath, DocumentRoot};

/// Answers "is this file present on this machine?".
pub trait FileProbe {
    fn exists(&self, path: &DocPath) -> bool;
}

impl<F> FileProbe for F
where
    F: Fn(&DocPath) -> bool,
{
    fn exists(&self, path: &DocPath) -> bool {
        self(path)
    }
}

/// Probe backed by the real filesystem under a [`DocumentRoot`].
#[derive(Debug, Clone)]
pub struct RootProbe {
    root: DocumentRoot,
}

impl RootProbe {
    pub fn new(root: DocumentRoot) -> Self {
        Self { root }
    }
}

impl FileProbe for RootProbe {
    fn exists(&self, path: &DocPath) -> bool {
        self.root.absolute(path).is_file()
    }
}
