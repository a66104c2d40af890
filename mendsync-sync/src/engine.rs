//! Three-way reconciliation between the catalog, the baseline and the disk.
//!
//! Each `(reference, path)` pair in `catalog ∪ baseline` is classified:
//!
//! | catalog | baseline | file on disk | result                              |
//! |---------|----------|--------------|-------------------------------------|
//! | yes     | yes      | yes          | stable, nothing to do               |
//! | yes     | yes      | no           | stable, `FileMissing` advisory      |
//! | yes     | no       | any          | `ADD_TO_SNAPSHOT`                   |
//! | no      | yes      | yes          | `ADD_TO_DB`                         |
//! | no      | yes      | no           | `REMOVE_FROM_SNAPSHOT`              |
//!
//! Before classification, a catalog-only pair and a baseline-only pair of
//! the same reference that carry the same file hash are matched up: the file
//! was moved or renamed on one side. Both pairs are held back as a relocation
//! conflict instead of producing an add and a removal.
//!
//! The engine never proposes `REMOVE_FROM_DB`: links a user deletes in the
//! catalog are respected locally but are not mirrored, so the tool only ever
//! adds to the catalog.

use std::collections::BTreeSet;

use mendsync_core::{AssociationSet, DocPath, FileAssociation, ReferenceId};

use crate::plan::{AdvisoryKind, ChangeEntry, ChangePlan, Direction, PlanBuilder, Reason};
use crate::probe::FileProbe;

/// Presence of one pair across the two stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Both,
    CatalogOnly,
    BaselineOnly,
}

/// Compute the plan that brings the catalog and the baseline into agreement.
pub fn reconcile(
    catalog: &AssociationSet,
    baseline: &AssociationSet,
    probe: &dyn FileProbe,
) -> ChangePlan {
    let mut builder = PlanBuilder::new();
    let mut held_back = BTreeSet::new();

    for (reference, catalog_path, baseline_path) in relocations(catalog, baseline) {
        tracing::debug!("{reference}: {baseline_path} relinked as {catalog_path}");
        let baseline_direction = if probe.exists(&baseline_path) {
            Direction::AddToDb
        } else {
            Direction::RemoveFromSnapshot
        };
        held_back.insert((reference.clone(), catalog_path.clone()));
        held_back.insert((reference.clone(), baseline_path.clone()));
        builder.relocated(
            reference,
            catalog_path,
            baseline_path,
            vec![baseline_direction, Direction::AddToSnapshot],
        );
    }

    let mut keys = catalog.keys();
    keys.extend(baseline.keys());

    for (reference, path) in keys {
        if held_back.contains(&(reference.clone(), path.clone())) {
            continue;
        }
        let in_catalog = catalog.get(&reference, &path);
        let in_baseline = baseline.get(&reference, &path);
        let presence = match (in_catalog.is_some(), in_baseline.is_some()) {
            (true, true) => Presence::Both,
            (true, false) => Presence::CatalogOnly,
            (false, true) => Presence::BaselineOnly,
            (false, false) => continue,
        };
        let meta = in_catalog.or(in_baseline).cloned().unwrap_or_default();
        let assoc = FileAssociation {
            reference: reference.clone(),
            path: path.clone(),
            meta,
        };

        match presence {
            Presence::Both => {
                if !probe.exists(&path) {
                    tracing::debug!("file missing locally, link retained: {path}");
                    builder.advise(reference, path, AdvisoryKind::FileMissing);
                }
            }
            Presence::CatalogOnly => builder.propose(
                true,
                false,
                ChangeEntry::new(Direction::AddToSnapshot, assoc, Reason::NewInCatalog),
            ),
            Presence::BaselineOnly => {
                let entry = if probe.exists(&path) {
                    ChangeEntry::new(Direction::AddToDb, assoc, Reason::PresentOnDisk)
                } else {
                    ChangeEntry::new(Direction::RemoveFromSnapshot, assoc, Reason::RemovedElsewhere)
                };
                builder.propose(false, true, entry);
            }
        }
    }

    builder.finish()
}

/// Catalog-only and baseline-only pairs of one reference with the same hash.
///
/// Each baseline pair is matched at most once; pairs without a hash never match.
fn relocations(
    catalog: &AssociationSet,
    baseline: &AssociationSet,
) -> Vec<(ReferenceId, DocPath, DocPath)> {
    let mut found = Vec::new();
    let mut matched: BTreeSet<(ReferenceId, DocPath)> = BTreeSet::new();

    for assoc in catalog.iter() {
        let Some(hash) = assoc.meta.hash.as_ref() else {
            continue;
        };
        if baseline.contains(&assoc.reference, &assoc.path) {
            continue;
        }
        let moved_from = baseline.paths_for(&assoc.reference).find(|path| {
            !catalog.contains(&assoc.reference, path)
                && !matched.contains(&(assoc.reference.clone(), (*path).clone()))
                && baseline
                    .get(&assoc.reference, path)
                    .and_then(|meta| meta.hash.as_ref())
                    == Some(hash)
        });
        if let Some(old) = moved_from {
            matched.insert((assoc.reference.clone(), old.clone()));
            found.push((assoc.reference.clone(), assoc.path.clone(), old.clone()));
        }
    }
    found
}

/// The snapshot content after `plan` has been applied.
///
/// Everything the catalog holds plus the planned `ADD_TO_DB` links, minus the
/// planned removals. Conflicted pairs keep whatever the baseline had.
/// Catalog metadata wins where both stores know a pair.
pub fn next_baseline(
    catalog: &AssociationSet,
    baseline: &AssociationSet,
    plan: &ChangePlan,
) -> AssociationSet {
    let mut next = AssociationSet::new();
    for assoc in catalog.iter() {
        if !plan.is_conflicted(&assoc.reference, &assoc.path) {
            next.insert(assoc);
        }
    }

    for entry in &plan.entries {
        let a = &entry.association;
        match entry.direction {
            Direction::AddToDb | Direction::AddToSnapshot => {
                next.insert(a.clone());
            }
            Direction::RemoveFromDb | Direction::RemoveFromSnapshot => {
                next.remove(&a.reference, &a.path);
            }
        }
    }

    for conflict in &plan.conflicts {
        for path in conflict.paths() {
            if let Some(meta) = baseline.get(&conflict.reference, path) {
                next.insert(FileAssociation {
                    reference: conflict.reference.clone(),
                    path: path.clone(),
                    meta: meta.clone(),
                });
            }
        }
    }
    next
}
