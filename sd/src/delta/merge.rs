//! Merge engine
//!
//! Folds one operation into one page. Merging the same operation twice
//! leaves the page exactly as the first merge did, apart from bookkeeping.

use tracing::debug;

use super::markdown::{
    ELLIPSIS, clamp_summary, collapse_whitespace, dedupe_case_insensitive, normalize_for_containment,
    normalize_title_key, sanitize_title,
};
use super::types::{PageState, ParsedOperation, UpdatePolicy};

/// What a single merge actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub content_changed: bool,
    pub metadata_changed: bool,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.content_changed || self.metadata_changed
    }
}

/// Apply `op` to `page` under `policy`
pub fn merge_operation(
    page: &mut PageState,
    op: &ParsedOperation,
    policy: UpdatePolicy,
    chunk_index: usize,
    max_summary_chars: usize,
) -> MergeOutcome {
    debug!(path = %page.path, page_key = %op.page_key, %chunk_index, %policy, "merge_operation: called");
    let mut outcome = MergeOutcome::default();

    if policy.merges_metadata(page.created) {
        outcome.metadata_changed = merge_metadata(page, op, max_summary_chars);
    } else {
        debug!(path = %page.path, "merge_operation: metadata locked by policy");
    }

    outcome.content_changed = merge_content(page, &op.content);

    page.max_confidence = page.max_confidence.max(op.confidence);
    let rationale = op.rationale.trim();
    if !rationale.is_empty() && !page.rationales.iter().any(|r| r == rationale) {
        page.rationales.push(rationale.to_string());
    }
    page.chunk_indices.insert(chunk_index);
    page.applied_operations += 1;

    if outcome.changed() {
        page.touched = true;
    }
    debug!(path = %page.path, ?outcome, "merge_operation: done");
    outcome
}

fn merge_metadata(page: &mut PageState, op: &ParsedOperation, max_summary_chars: usize) -> bool {
    let mut changed = false;

    let incoming_title = sanitize_title(&op.title);
    if !incoming_title.is_empty() {
        if page.title.trim().is_empty() {
            page.title = incoming_title;
            changed = true;
        } else if normalize_title_key(&incoming_title) != normalize_title_key(&page.title) {
            // A differing title is another name for the same page
            changed |= add_unique(&mut page.aliases, &[incoming_title]);
        }
    }

    let summary = merge_summary(&page.summary, &op.summary, max_summary_chars);
    if summary != page.summary {
        page.summary = summary;
        changed = true;
    }

    changed |= add_unique(&mut page.keywords, &op.keywords);

    let title_key = normalize_title_key(&page.title);
    let aliases: Vec<String> = op
        .aliases
        .iter()
        .filter(|a| normalize_title_key(a) != title_key)
        .cloned()
        .collect();
    changed |= add_unique(&mut page.aliases, &aliases);

    changed
}

/// Combine an existing and an incoming summary
///
/// Incoming text already present (case-insensitively) leaves the existing
/// summary in place; otherwise both are joined with `" | "`. A summary that
/// was already cut to `max_chars` stays as it is when nothing of the
/// incoming text would survive the cut.
pub fn merge_summary(existing: &str, incoming: &str, max_chars: usize) -> String {
    let incoming = incoming.trim();
    let existing = clamp_summary(existing, max_chars);
    if existing.to_lowercase().contains(&incoming.to_lowercase()) {
        return existing;
    }
    if existing.is_empty() {
        return clamp_summary(incoming, max_chars);
    }

    if let Some(stem) = existing.strip_suffix(ELLIPSIS) {
        // The cut summary is a prefix of the incoming one: same text again
        let stem = stem.to_lowercase();
        if collapse_whitespace(incoming).to_lowercase().starts_with(&stem) {
            return existing;
        }
    }

    let merged = clamp_summary(&format!("{} | {}", existing, incoming), max_chars);
    let merged_stem = merged.strip_suffix(ELLIPSIS).unwrap_or(&merged);
    let existing_stem = existing.strip_suffix(ELLIPSIS).unwrap_or(&existing);
    if merged_stem.chars().count() <= existing_stem.chars().count() + ELLIPSIS.len() {
        return existing;
    }
    merged
}

/// Append a content block unless an equivalent one is already there
fn merge_content(page: &mut PageState, content: &str) -> bool {
    let content = content.trim();
    if content.is_empty() {
        return false;
    }
    if is_contained(&page.content_blocks, content) {
        debug!(path = %page.path, "merge_content: content already present");
        return false;
    }
    page.content_blocks.push(content.to_string());
    true
}

/// Whether `incoming` and some existing block contain one another, ignoring
/// case and whitespace
pub fn is_contained(blocks: &[String], incoming: &str) -> bool {
    let needle = normalize_for_containment(incoming);
    if needle.is_empty() {
        return true;
    }
    blocks.iter().any(|block| {
        let hay = normalize_for_containment(block);
        !hay.is_empty() && (hay.contains(&needle) || needle.contains(&hay))
    })
}

/// Case-insensitive union into `target`; true when anything was added
fn add_unique(target: &mut Vec<String>, incoming: &[String]) -> bool {
    let before = target.len();
    let mut merged = std::mem::take(target);
    merged.extend(incoming.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));
    *target = dedupe_case_insensitive(merged);
    target.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(content: &str) -> ParsedOperation {
        ParsedOperation {
            page_key: "character/alice".to_string(),
            title: "Alice".to_string(),
            summary: String::new(),
            keywords: vec![],
            aliases: vec![],
            content: content.to_string(),
            confidence: 0.8,
            rationale: "mentioned".to_string(),
        }
    }

    fn existing_page() -> PageState {
        PageState {
            path: "wiki/character-alice.md".to_string(),
            page_key: "character/alice".to_string(),
            title: "Alice".to_string(),
            summary: "A courier.".to_string(),
            keywords: vec!["courier".to_string()],
            content_blocks: vec!["# Alice\n\n## Backstory\n\nAlice carries letters to the tower.".to_string()],
            original_content: Some("...".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_merge_rules() {
        assert_eq!(merge_summary("A brave courier.", "brave COURIER", 100), "A brave courier.");
        assert_eq!(merge_summary("A courier.", "Lives in the tower.", 100), "A courier. | Lives in the tower.");
        assert_eq!(merge_summary("", "New.", 100), "New.");
        assert_eq!(merge_summary("Old.", "", 100), "Old.");
        // Nothing of the incoming text fits next to the existing summary
        assert_eq!(merge_summary("alpha beta gamma", "delta epsilon", 20), "alpha beta gamma");
    }

    #[test]
    fn test_cut_summary_is_stable() {
        let long = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let first = merge_summary("", long, 30);
        assert_eq!(first, "alpha beta gamma delta...");

        assert_eq!(merge_summary(&first, long, 30), first);
        assert_eq!(merge_summary(&first, "Zeta rules the tower.", 30), first);
        assert_eq!(merge_summary(&merge_summary(&first, long, 30), long, 30), first);
    }

    #[test]
    fn test_containment_either_direction() {
        let blocks = vec!["Alice  carries LETTERS.".to_string()];
        assert!(is_contained(&blocks, "alice carries letters."));
        assert!(is_contained(&blocks, "Every day, Alice carries letters. She is tired."));
        assert!(!is_contained(&blocks, "Bob sells bread."));
        assert!(!is_contained(&[], "anything"));
    }

    #[test]
    fn test_noop_merge_does_not_touch() {
        let mut page = existing_page();
        let outcome = merge_operation(
            &mut page,
            &op("Alice carries letters to the tower."),
            UpdatePolicy::StructuredMerge,
            1,
            320,
        );
        assert!(!outcome.changed());
        assert!(!page.touched);
        assert_eq!(page.applied_operations, 1);
        assert_eq!(page.chunk_indices.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(page.max_confidence, 0.8);
        assert_eq!(page.rationales, vec!["mentioned"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut page = existing_page();
        let mut incoming = op("Alice once lost a parcel.");
        incoming.summary = "Lost a parcel once.".to_string();
        incoming.keywords = vec!["Parcel".to_string()];

        assert!(merge_operation(&mut page, &incoming, UpdatePolicy::StructuredMerge, 1, 320).changed());
        let after_first = page.clone();

        let outcome = merge_operation(&mut page, &incoming, UpdatePolicy::StructuredMerge, 2, 320);
        assert!(!outcome.changed());
        assert_eq!(page.content_blocks, after_first.content_blocks);
        assert_eq!(page.summary, after_first.summary);
        assert_eq!(page.keywords, after_first.keywords);
        assert_eq!(page.applied_operations, 2);
    }

    #[test]
    fn test_safe_append_locks_metadata_on_existing_pages() {
        let mut page = existing_page();
        let mut incoming = op("A brand new fact.");
        incoming.title = "Alicia".to_string();
        incoming.summary = "Different summary.".to_string();
        incoming.keywords = vec!["new".to_string()];

        let outcome = merge_operation(&mut page, &incoming, UpdatePolicy::SafeAppend, 1, 320);
        assert!(outcome.content_changed);
        assert!(!outcome.metadata_changed);
        assert_eq!(page.summary, "A courier.");
        assert_eq!(page.keywords, vec!["courier"]);
        assert!(page.aliases.is_empty());
        assert_eq!(page.content_blocks.last().unwrap(), "A brand new fact.");
    }

    #[test]
    fn test_safe_append_merges_metadata_on_created_pages() {
        let mut page = PageState {
            page_key: "character/bob".to_string(),
            title: "Bob".to_string(),
            created: true,
            ..Default::default()
        };
        let mut incoming = op("");
        incoming.title = "Bob".to_string();
        incoming.summary = "A baker.".to_string();

        let outcome = merge_operation(&mut page, &incoming, UpdatePolicy::SafeAppend, 1, 320);
        assert!(outcome.metadata_changed);
        assert!(page.touched);
        assert_eq!(page.summary, "A baker.");
    }

    #[test]
    fn test_differing_title_becomes_alias() {
        let mut page = existing_page();
        let mut incoming = op("");
        incoming.title = "Character: The Courier".to_string();
        incoming.aliases = vec!["alice".to_string(), "Ali".to_string()];

        let outcome = merge_operation(&mut page, &incoming, UpdatePolicy::StructuredMerge, 3, 320);
        assert!(outcome.metadata_changed);
        assert_eq!(page.title, "Alice");
        assert_eq!(page.aliases, vec!["The Courier", "Ali"]);
    }

    #[test]
    fn test_title_only_op_on_new_page_is_noop() {
        let mut page = PageState {
            page_key: "character/bob".to_string(),
            title: "Bob".to_string(),
            created: true,
            ..Default::default()
        };
        let mut incoming = op("");
        incoming.title = "bob".to_string();
        let outcome = merge_operation(&mut page, &incoming, UpdatePolicy::StructuredMerge, 1, 320);
        assert!(!outcome.changed());
        assert!(!page.touched);
    }
}
