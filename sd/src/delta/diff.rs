//! Line diff previews
//!
//! A single-hunk preview: common prefix and suffix are collapsed, the
//! differing middle is shown with one line of context on each side.

use tracing::debug;

use super::types::{DiffPreview, PageAction};

/// Rendered line cap for one preview
pub const MAX_PREVIEW_LINES: usize = 220;

pub const TRUNCATION_MARKER: &str = "... [truncated]";

pub const NO_CHANGES: &str = "(no changes)";

/// Build the preview for one planned page
pub fn build_diff_preview(action: PageAction, previous: Option<&str>, next: &str) -> DiffPreview {
    debug!(%action, has_previous = previous.is_some(), "build_diff_preview: called");
    let next_lines: Vec<&str> = next.lines().collect();
    match (action, previous) {
        (PageAction::Update, Some(previous)) => update_preview(&previous.lines().collect::<Vec<_>>(), &next_lines),
        _ => create_preview(&next_lines),
    }
}

fn create_preview(next: &[&str]) -> DiffPreview {
    let mut rendered = Vec::with_capacity(next.len() + 1);
    rendered.push(format!("@@ -0,0 +1,{} @@", next.len()));
    rendered.extend(next.iter().map(|line| format!("+{}", line)));
    finish(rendered, next.len(), 0)
}

fn update_preview(previous: &[&str], next: &[&str]) -> DiffPreview {
    if previous == next {
        return DiffPreview {
            added_lines: 0,
            removed_lines: 0,
            preview: NO_CHANGES.to_string(),
            truncated: false,
        };
    }

    let shortest = previous.len().min(next.len());
    let prefix = previous.iter().zip(next).take_while(|(a, b)| a == b).count();
    let suffix = previous
        .iter()
        .rev()
        .zip(next.iter().rev())
        .take(shortest - prefix)
        .take_while(|(a, b)| a == b)
        .count();

    let removed = &previous[prefix..previous.len() - suffix];
    let added = &next[prefix..next.len() - suffix];

    let mut rendered = Vec::with_capacity(removed.len() + added.len() + 3);
    rendered.push(format!(
        "@@ -{},{} +{},{} @@",
        prefix + 1,
        removed.len(),
        prefix + 1,
        added.len()
    ));
    if prefix > 0 {
        rendered.push(format!(" {}", previous[prefix - 1]));
    }
    rendered.extend(removed.iter().map(|line| format!("-{}", line)));
    rendered.extend(added.iter().map(|line| format!("+{}", line)));
    if suffix > 0 {
        rendered.push(format!(" {}", previous[previous.len() - suffix]));
    }

    finish(rendered, added.len(), removed.len())
}

fn finish(mut rendered: Vec<String>, added_lines: usize, removed_lines: usize) -> DiffPreview {
    let truncated = rendered.len() > MAX_PREVIEW_LINES;
    if truncated {
        rendered.truncate(MAX_PREVIEW_LINES);
        rendered.push(TRUNCATION_MARKER.to_string());
    }
    DiffPreview {
        added_lines,
        removed_lines,
        preview: rendered.join("\n"),
        truncated,
    }
}
