//! Unified diff of the snapshot text for dry-run previews.

use similar::TextDiff;

/// Diff `current` (absent when no snapshot exists) against `rendered`.
///
/// Returns `None` when the texts are identical after line-ending normalization.
pub fn snapshot_diff(label: &str, current: Option<&str>, rendered: &str) -> Option<String> {
    let existing = current.map(normalize_line_endings).unwrap_or_default();
    let rendered = normalize_line_endings(rendered);
    if existing == rendered {
        return None;
    }

    let old_header = if current.is_some() {
        format!("a/{label}")
    } else {
        "/dev/null".to_string()
    };
    let new_header = format!("b/{label}");
    Some(
        TextDiff::from_lines(&existing, &rendered)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string(),
    )
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
