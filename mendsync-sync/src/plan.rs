//! [`ChangePlan`]: the ordered mutations computed for one run.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use mendsync_core::{DocPath, FileAssociation, ReferenceId};

// ---------------------------------------------------------------------------
// Directions and reasons
// ---------------------------------------------------------------------------

/// Which store a change targets and whether it adds or removes.
///
/// Declaration order is the emission order of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    AddToDb,
    RemoveFromDb,
    AddToSnapshot,
    RemoveFromSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Database,
    Snapshot,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::AddToDb,
        Direction::RemoveFromDb,
        Direction::AddToSnapshot,
        Direction::RemoveFromSnapshot,
    ];

    pub fn target(self) -> Target {
        match self {
            Direction::AddToDb | Direction::RemoveFromDb => Target::Database,
            Direction::AddToSnapshot | Direction::RemoveFromSnapshot => Target::Snapshot,
        }
    }

    /// The direction that would undo this one on the same store.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::AddToDb => Direction::RemoveFromDb,
            Direction::RemoveFromDb => Direction::AddToDb,
            Direction::AddToSnapshot => Direction::RemoveFromSnapshot,
            Direction::RemoveFromSnapshot => Direction::AddToSnapshot,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::AddToDb => "ADD_TO_DB",
            Direction::RemoveFromDb => "REMOVE_FROM_DB",
            Direction::AddToSnapshot => "ADD_TO_SNAPSHOT",
            Direction::RemoveFromSnapshot => "REMOVE_FROM_SNAPSHOT",
        };
        f.write_str(s)
    }
}

/// Why the engine proposed a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Linked in the catalog since the last sync.
    NewInCatalog,
    /// Remembered by the baseline and present on disk, but not in the catalog.
    PresentOnDisk,
    /// Remembered by the baseline, gone from the catalog and from disk.
    RemovedElsewhere,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::NewInCatalog => "linked in the catalog since the last sync",
            Reason::PresentOnDisk => "synced from another machine; file is present locally",
            Reason::RemovedElsewhere => "removed on another machine",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Plan contents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub direction: Direction,
    #[serde(flatten)]
    pub association: FileAssociation,
    pub reason: Reason,
}

impl ChangeEntry {
    pub fn new(direction: Direction, association: FileAssociation, reason: Reason) -> Self {
        Self {
            direction,
            association,
            reason,
        }
    }

    fn sort_key(&self) -> (Direction, &ReferenceId, &DocPath) {
        (
            self.direction,
            &self.association.reference,
            &self.association.path,
        )
    }
}

/// A pair the engine refuses to resolve automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub reference: ReferenceId,
    /// For a relocation, the path the catalog links.
    pub path: DocPath,
    pub in_catalog: bool,
    pub in_baseline: bool,
    /// The changes that were proposed and withdrawn.
    pub proposed: Vec<Direction>,
    #[serde(flatten)]
    pub kind: ConflictKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    /// Opposing changes were proposed for the same store.
    Contradictory,
    /// The same file (by hash) is linked to the reference at a different
    /// path in each store.
    Relocated { baseline_path: DocPath },
}

impl Conflict {
    /// Whether this conflict holds back `(reference, path)`.
    pub fn covers(&self, reference: &ReferenceId, path: &DocPath) -> bool {
        &self.reference == reference && self.paths().any(|p| p == path)
    }

    /// Every path this conflict holds back.
    pub fn paths(&self) -> impl Iterator<Item = &DocPath> {
        let baseline_path = match &self.kind {
            ConflictKind::Contradictory => None,
            ConflictKind::Relocated { baseline_path } => Some(baseline_path),
        };
        std::iter::once(&self.path).chain(baseline_path)
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.reference, self.path)?;
        if let ConflictKind::Relocated { baseline_path } = &self.kind {
            write!(f, " (snapshot has it at {baseline_path})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    /// Linked in both stores, but the file is not on this machine (yet).
    FileMissing,
}

/// A non-fatal observation reported alongside the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub reference: ReferenceId,
    pub path: DocPath,
    pub kind: AdvisoryKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangePlan {
    pub entries: Vec<ChangeEntry>,
    pub conflicts: Vec<Conflict>,
    pub advisories: Vec<Advisory>,
}

impl ChangePlan {
    /// No changes and no conflicts. Advisories do not count.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.conflicts.is_empty()
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.entries_for(direction).count()
    }

    pub fn entries_for(&self, direction: Direction) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(move |e| e.direction == direction)
    }

    /// Entries that mutate the catalog, in plan order.
    pub fn database_entries(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.direction.target() == Target::Database)
    }

    pub fn is_conflicted(&self, reference: &ReferenceId, path: &DocPath) -> bool {
        self.conflicts.iter().any(|c| c.covers(reference, path))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PendingPair {
    in_catalog: bool,
    in_baseline: bool,
    entries: Vec<ChangeEntry>,
}

/// Collects proposals per pair and turns contradictory ones into conflicts.
#[derive(Debug, Default)]
pub(crate) struct PlanBuilder {
    pairs: BTreeMap<(ReferenceId, DocPath), PendingPair>,
    conflicts: Vec<Conflict>,
    advisories: Vec<Advisory>,
}

impl PlanBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn propose(&mut self, in_catalog: bool, in_baseline: bool, entry: ChangeEntry) {
        let key = (
            entry.association.reference.clone(),
            entry.association.path.clone(),
        );
        let pending = self.pairs.entry(key).or_default();
        pending.in_catalog |= in_catalog;
        pending.in_baseline |= in_baseline;
        pending.entries.push(entry);
    }

    pub(crate) fn advise(&mut self, reference: ReferenceId, path: DocPath, kind: AdvisoryKind) {
        self.advisories.push(Advisory {
            reference,
            path,
            kind,
        });
    }

    /// Hold back a file the two stores link at different paths.
    pub(crate) fn relocated(
        &mut self,
        reference: ReferenceId,
        catalog_path: DocPath,
        baseline_path: DocPath,
        proposed: Vec<Direction>,
    ) {
        self.conflicts.push(Conflict {
            reference,
            path: catalog_path,
            in_catalog: true,
            in_baseline: true,
            proposed,
            kind: ConflictKind::Relocated { baseline_path },
        });
    }

    pub(crate) fn finish(self) -> ChangePlan {
        let mut plan = ChangePlan {
            conflicts: self.conflicts,
            advisories: self.advisories,
            ..ChangePlan::default()
        };

        for ((reference, path), pending) in self.pairs {
            let contradictory = pending.entries.iter().any(|e| {
                pending
                    .entries
                    .iter()
                    .any(|other| other.direction == e.direction.opposite())
            });
            if contradictory {
                let mut proposed: Vec<_> = pending.entries.iter().map(|e| e.direction).collect();
                proposed.sort();
                proposed.dedup();
                plan.conflicts.push(Conflict {
                    reference,
                    path,
                    in_catalog: pending.in_catalog,
                    in_baseline: pending.in_baseline,
                    proposed,
                    kind: ConflictKind::Contradictory,
                });
            } else {
                plan.entries.extend(pending.entries);
            }
        }

        plan.entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        plan.entries.dedup_by(|a, b| a.sort_key() == b.sort_key());
        plan.conflicts
            .sort_by(|a, b| (&a.reference, &a.path).cmp(&(&b.reference, &b.path)));
        plan.advisories
            .sort_by(|a, b| (&a.reference, &a.path).cmp(&(&b.reference, &b.path)));
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(direction: Direction, reference: &str, path: &str) -> ChangeEntry {
        ChangeEntry::new(
            direction,
            FileAssociation::new(reference, DocPath::parse(path).unwrap()),
            Reason::NewInCatalog,
        )
    }

    #[test]
    fn entries_are_grouped_by_direction_then_sorted() {
        let mut b = PlanBuilder::new();
        b.propose(true, false, entry(Direction::AddToSnapshot, "r2", "b.pdf"));
        b.propose(false, true, entry(Direction::AddToDb, "r9", "z.pdf"));
        b.propose(true, false, entry(Direction::AddToSnapshot, "r1", "c.pdf"));
        b.propose(false, true, entry(Direction::RemoveFromSnapshot, "r0", "a.pdf"));
        b.propose(true, false, entry(Direction::AddToSnapshot, "r1", "a.pdf"));
        let plan = b.finish();

        let order: Vec<_> = plan
            .entries
            .iter()
            .map(|e| format!("{} {}:{}", e.direction, e.association.reference, e.association.path))
            .collect();
        assert_eq!(
            order,
            vec![
                "ADD_TO_DB r9:z.pdf",
                "ADD_TO_SNAPSHOT r1:a.pdf",
                "ADD_TO_SNAPSHOT r1:c.pdf",
                "ADD_TO_SNAPSHOT r2:b.pdf",
                "REMOVE_FROM_SNAPSHOT r0:a.pdf",
            ]
        );
    }

    #[test]
    fn opposing_proposals_for_one_pair_become_a_conflict() {
        let mut b = PlanBuilder::new();
        b.propose(true, false, entry(Direction::AddToSnapshot, "r1", "a.pdf"));
        b.propose(false, true, entry(Direction::RemoveFromSnapshot, "r1", "a.pdf"));
        b.propose(true, false, entry(Direction::AddToSnapshot, "r2", "b.pdf"));
        let plan = b.finish();

        assert_eq!(plan.entries.len(), 1, "conflicting entries must be withdrawn");
        assert_eq!(plan.conflicts.len(), 1);
        let c = &plan.conflicts[0];
        assert_eq!(c.reference, ReferenceId::from("r1"));
        assert!(c.in_catalog && c.in_baseline);
        assert_eq!(
            c.proposed,
            vec![Direction::AddToSnapshot, Direction::RemoveFromSnapshot]
        );
        assert_eq!(c.kind, ConflictKind::Contradictory);
        assert!(plan.is_conflicted(&ReferenceId::from("r1"), &DocPath::parse("a.pdf").unwrap()));
    }

    #[test]
    fn relocation_holds_back_both_paths() {
        let mut b = PlanBuilder::new();
        b.relocated(
            "r1".into(),
            DocPath::parse("a.pdf").unwrap(),
            DocPath::parse("moved/a.pdf").unwrap(),
            vec![Direction::AddToDb, Direction::AddToSnapshot],
        );
        let plan = b.finish();
        assert!(!plan.is_empty());
        let r1 = ReferenceId::from("r1");
        assert!(plan.is_conflicted(&r1, &DocPath::parse("a.pdf").unwrap()));
        assert!(plan.is_conflicted(&r1, &DocPath::parse("moved/a.pdf").unwrap()));
        assert!(!plan.is_conflicted(&"r2".into(), &DocPath::parse("a.pdf").unwrap()));
        assert_eq!(
            plan.conflicts[0].to_string(),
            "r1 -> a.pdf (snapshot has it at moved/a.pdf)"
        );

        let json = serde_json::to_value(&plan.conflicts[0]).unwrap();
        assert_eq!(json["kind"], "relocated");
        assert_eq!(json["baseline_path"], "moved/a.pdf");
    }

    #[test]
    fn changes_to_different_stores_do_not_conflict() {
        let mut b = PlanBuilder::new();
        b.propose(false, true, entry(Direction::AddToDb, "r1", "a.pdf"));
        b.propose(false, true, entry(Direction::RemoveFromSnapshot, "r1", "a.pdf"));
        let plan = b.finish();
        assert!(plan.conflicts.is_empty());
        assert_eq!(plan.entries.len(), 2);
    }

    #[test]
    fn repeated_proposals_are_deduplicated() {
        let mut b = PlanBuilder::new();
        b.propose(true, false, entry(Direction::AddToSnapshot, "r1", "a.pdf"));
        b.propose(true, false, entry(Direction::AddToSnapshot, "r1", "a.pdf"));
        assert_eq!(b.finish().entries.len(), 1);
    }

    #[test]
    fn advisories_do_not_make_a_plan_non_empty() {
        let mut b = PlanBuilder::new();
        b.advise(
            "r1".into(),
            DocPath::parse("a.pdf").unwrap(),
            AdvisoryKind::FileMissing,
        );
        let plan = b.finish();
        assert!(plan.is_empty());
        assert_eq!(plan.advisories.len(), 1);
    }
}
