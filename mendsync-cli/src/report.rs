//! Human and JSON rendering of a finished sync run.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use mendsync_core::{ApplyOutcome, WriteResult};
use mendsync_sync::{
    Advisory, AppliedEntry, ChangeEntry, Conflict, Direction, SyncOutcome, Target,
};

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "change")]
    change: String,
    #[tabled(rename = "count")]
    count: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    dry_run: bool,
    first_run: bool,
    counts: BTreeMap<String, usize>,
    entries: &'a [ChangeEntry],
    applied: &'a [AppliedEntry],
    conflicts: &'a [Conflict],
    advisories: &'a [Advisory],
    snapshot: &'a WriteResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_diff: Option<&'a str>,
}

fn counts(outcome: &SyncOutcome) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = Direction::ALL
        .iter()
        .map(|d| (d.to_string(), outcome.plan.count(*d)))
        .collect();
    counts.insert("CONFLICTS".into(), outcome.plan.conflicts.len());
    counts.insert("FILES_MISSING".into(), outcome.plan.advisories.len());
    counts
}

pub fn render_json(outcome: &SyncOutcome) -> Result<String> {
    let report = JsonReport {
        generated_at: Utc::now(),
        dry_run: outcome.report.mode.is_dry_run(),
        first_run: !outcome.baseline_existed,
        counts: counts(outcome),
        entries: &outcome.plan.entries,
        applied: &outcome.report.applied,
        conflicts: &outcome.plan.conflicts,
        advisories: &outcome.plan.advisories,
        snapshot: &outcome.report.snapshot,
        snapshot_diff: outcome.report.snapshot_diff.as_deref(),
    };
    serde_json::to_string_pretty(&report).context("failed to serialize sync report")
}

pub fn render_human(outcome: &SyncOutcome) -> String {
    let dry_run = outcome.report.mode.is_dry_run();
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{prefix}mendsync v{} | catalog: {} links | snapshot: {} links",
        env!("CARGO_PKG_VERSION"),
        outcome.catalog_size,
        outcome.baseline_size,
    );

    if outcome.plan.is_empty() {
        let _ = writeln!(out, "{prefix}{} catalog and snapshot are in sync", "✓".green());
    } else {
        let rows: Vec<SummaryRow> = Direction::ALL
            .iter()
            .map(|d| SummaryRow {
                change: d.to_string(),
                count: outcome.plan.count(*d),
            })
            .chain(std::iter::once(SummaryRow {
                change: "CONFLICT".into(),
                count: outcome.plan.conflicts.len(),
            }))
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        let _ = writeln!(out, "{table}");
    }

    for entry in &outcome.plan.entries {
        let a = &entry.association;
        let marker = match entry.direction {
            Direction::AddToDb | Direction::AddToSnapshot => "+".green(),
            Direction::RemoveFromDb | Direction::RemoveFromSnapshot => "-".red(),
        };
        let _ = write!(
            out,
            "{prefix}  {marker} {:<20} {} -> {}  ({})",
            entry.direction.to_string(),
            a.reference,
            a.path,
            entry.reason
        );
        if entry.direction.target() == Target::Database && !dry_run {
            let _ = write!(out, "{}", outcome_suffix(outcome, entry));
        }
        out.push('\n');
    }

    if !outcome.plan.conflicts.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!("{prefix}Conflicts (requires manual resolution):").yellow().bold()
        );
        for c in &outcome.plan.conflicts {
            let proposed: Vec<String> = c.proposed.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "{prefix}  ! {c}  [proposed: {}]", proposed.join(", "));
        }
    }

    if !outcome.plan.advisories.is_empty() {
        let _ = writeln!(out, "{prefix}Files missing on this machine (links kept):");
        for a in &outcome.plan.advisories {
            let _ = writeln!(out, "{prefix}  ? {} -> {}", a.reference, a.path);
        }
    }

    let snapshot_line = match &outcome.report.snapshot {
        WriteResult::Written { path } => format!("  ✎  snapshot written: {}", path.display()),
        WriteResult::WouldWrite { path } => format!("  ~  snapshot would change: {}", path.display()),
        WriteResult::Unchanged { path } => format!("  ·  snapshot unchanged: {}", path.display()),
    };
    let _ = writeln!(out, "{prefix}{snapshot_line}");

    if let Some(diff) = &outcome.report.snapshot_diff {
        out.push_str(diff);
        if !diff.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn outcome_suffix(outcome: &SyncOutcome, entry: &ChangeEntry) -> String {
    let applied = outcome.report.applied.iter().find(|a| &a.entry == entry);
    match applied.map(|a| &a.outcome) {
        Some(ApplyOutcome::Applied) => String::new(),
        Some(ApplyOutcome::AlreadyPresent) => " [already present]".to_string(),
        Some(ApplyOutcome::AlreadyAbsent) => " [already absent]".to_string(),
        Some(ApplyOutcome::Skipped { reason }) => format!(" [skipped: {reason}]").yellow().to_string(),
        None => String::new(),
    }
}
