//! [`AssociationSet`]: which files are linked to which reference.
//!
//! Both the catalog view and the snapshot view are expressed as an
//! `AssociationSet`. Pairs are unique per set; equality compares the set of
//! `(reference, path)` pairs only, ignoring [`FileMeta`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{DocPath, FileAssociation, FileMeta, ReferenceId};

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssociationSet {
    refs: BTreeMap<ReferenceId, BTreeMap<DocPath, FileMeta>>,
}

impl AssociationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, failing on the first repeated `(reference, path)` pair.
    pub fn from_associations<I>(associations: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = FileAssociation>,
    {
        let mut set = Self::new();
        for assoc in associations {
            set.try_insert(assoc)?;
        }
        Ok(set)
    }

    /// Insert a new association; a repeated pair is [`CoreError::MalformedInput`].
    pub fn try_insert(&mut self, assoc: FileAssociation) -> Result<(), CoreError> {
        let paths = self.refs.entry(assoc.reference.clone()).or_default();
        if paths.contains_key(&assoc.path) {
            return Err(CoreError::MalformedInput {
                reference: assoc.reference,
                path: assoc.path,
            });
        }
        paths.insert(assoc.path, assoc.meta);
        Ok(())
    }

    /// Insert or replace. Returns `true` if the pair was not present before.
    pub fn insert(&mut self, assoc: FileAssociation) -> bool {
        self.refs
            .entry(assoc.reference)
            .or_default()
            .insert(assoc.path, assoc.meta)
            .is_none()
    }

    /// Remove a pair. Returns `true` if it was present.
    pub fn remove(&mut self, reference: &ReferenceId, path: &DocPath) -> bool {
        let Some(paths) = self.refs.get_mut(reference) else {
            return false;
        };
        let removed = paths.remove(path).is_some();
        if paths.is_empty() {
            self.refs.remove(reference);
        }
        removed
    }

    pub fn contains(&self, reference: &ReferenceId, path: &DocPath) -> bool {
        self.get(reference, path).is_some()
    }

    pub fn get(&self, reference: &ReferenceId, path: &DocPath) -> Option<&FileMeta> {
        self.refs.get(reference).and_then(|paths| paths.get(path))
    }

    /// Paths linked to `reference`, in sorted order.
    pub fn paths_for<'a>(&'a self, reference: &ReferenceId) -> impl Iterator<Item = &'a DocPath> {
        self.refs
            .get(reference)
            .into_iter()
            .flat_map(|paths| paths.keys())
    }

    /// Number of `(reference, path)` pairs.
    pub fn len(&self) -> usize {
        self.refs.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Iterate associations ordered by reference id, then path.
    pub fn iter(&self) -> impl Iterator<Item = FileAssociation> + '_ {
        self.refs.iter().flat_map(|(reference, paths)| {
            paths.iter().map(move |(path, meta)| FileAssociation {
                reference: reference.clone(),
                path: path.clone(),
                meta: meta.clone(),
            })
        })
    }

    /// Identity keys in sorted order.
    pub fn keys(&self) -> BTreeSet<(ReferenceId, DocPath)> {
        self.refs
            .iter()
            .flat_map(|(reference, paths)| {
                paths.keys().map(move |path| (reference.clone(), path.clone()))
            })
            .collect()
    }

    /// Associations present in `self` but absent from `other`.
    pub fn difference(&self, other: &AssociationSet) -> Vec<FileAssociation> {
        self.iter()
            .filter(|a| !other.contains(&a.reference, &a.path))
            .collect()
    }

    /// All pairs from both sets. On overlap, `self`'s metadata wins.
    pub fn union(&self, other: &AssociationSet) -> AssociationSet {
        let mut out = self.clone();
        for assoc in other.iter() {
            if !out.contains(&assoc.reference, &assoc.path) {
                out.insert(assoc);
            }
        }
        out
    }
}

impl PartialEq for AssociationSet {
    fn eq(&self, other: &Self) -> bool {
        self.refs.len() == other.refs.len()
            && self.refs.iter().all(|(reference, paths)| {
                other.refs.get(reference).is_some_and(|theirs| {
                    paths.len() == theirs.len() && paths.keys().all(|p| theirs.contains_key(p))
                })
            })
    }
}

impl Eq for AssociationSet {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileHash;

    fn assoc(reference: &str, path: &str) -> FileAssociation {
        FileAssociation::new(reference, DocPath::parse(path).unwrap())
    }

    fn set(pairs: &[(&str, &str)]) -> AssociationSet {
        AssociationSet::from_associations(pairs.iter().map(|(r, p)| assoc(r, p))).unwrap()
    }

    #[test]
    fn duplicate_pair_is_malformed_input() {
        let err = AssociationSet::from_associations([assoc("ref1", "a.pdf"), assoc("ref1", "a.pdf")])
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedInput { .. }), "got: {err}");
        assert!(err.to_string().contains("ref1"));
    }

    #[test]
    fn same_path_under_two_references_is_allowed() {
        let s = set(&[("ref1", "a.pdf"), ("ref2", "a.pdf")]);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn normalized_duplicates_are_detected() {
        let err = AssociationSet::from_associations([assoc("r", "dir/a.pdf"), assoc("r", "dir\\a.pdf")])
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedInput { .. }));
    }

    #[test]
    fn difference_is_keyed_by_pair() {
        let a = set(&[("ref1", "a.pdf"), ("ref2", "b.pdf")]);
        let b = set(&[("ref1", "a.pdf"), ("ref2", "c.pdf")]);
        let diff = a.difference(&b);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].reference, ReferenceId::from("ref2"));
        assert_eq!(diff[0].path.as_str(), "b.pdf");
    }

    #[test]
    fn union_prefers_left_metadata() {
        let mut left = AssociationSet::new();
        left.insert(assoc("r", "a.pdf").with_meta(FileMeta::new(Some(FileHash::from("left")), None)));
        let mut right = AssociationSet::new();
        right.insert(assoc("r", "a.pdf").with_meta(FileMeta::new(Some(FileHash::from("right")), None)));
        right.insert(assoc("r", "b.pdf"));

        let u = left.union(&right);
        assert_eq!(u.len(), 2);
        let path = DocPath::parse("a.pdf").unwrap();
        let meta = u.get(&ReferenceId::from("r"), &path).unwrap();
        assert_eq!(meta.hash, Some(FileHash::from("left")));
    }

    #[test]
    fn equality_ignores_metadata_and_insertion_order() {
        let a = set(&[("ref2", "b.pdf"), ("ref1", "a.pdf")]);
        let mut b = AssociationSet::new();
        b.insert(assoc("ref1", "a.pdf").with_meta(FileMeta::new(None, Some("Key".into()))));
        b.insert(assoc("ref2", "b.pdf"));
        assert_eq!(a, b);

        b.insert(assoc("ref2", "c.pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn remove_drops_empty_reference_buckets() {
        let mut s = set(&[("ref1", "a.pdf")]);
        assert!(s.remove(&ReferenceId::from("ref1"), &DocPath::parse("a.pdf").unwrap()));
        assert!(s.is_empty());
        assert_eq!(s, AssociationSet::new());
        assert!(!s.remove(&ReferenceId::from("ref1"), &DocPath::parse("a.pdf").unwrap()));
    }

    #[test]
    fn iteration_is_sorted_by_reference_then_path() {
        let s = set(&[("b", "z.pdf"), ("a", "y.pdf"), ("b", "a.pdf")]);
        let order: Vec<_> = s
            .iter()
            .map(|a| format!("{}:{}", a.reference, a.path))
            .collect();
        assert_eq!(order, vec!["a:y.pdf", "b:a.pdf", "b:z.pdf"]);
        assert_eq!(s.paths_for(&ReferenceId::from("b")).count(), 2);
    }
}
