//! Page renderer
//!
//! Turns a `PageState` back into document text. Rendering a freshly
//! hydrated page produces the same text it was hydrated from whenever that
//! text was itself rendered here.

use tracing::debug;

use super::markdown::{
    BLOCK_SEPARATOR, default_section_heading, fence_frontmatter, has_section_heading, humanize_key,
    remove_summary_section, sanitize_title, strip_title_heading, upsert_summary_section, yaml_quote,
};
use super::types::{PageState, UpdatePolicy};

/// Marker for pages created from story text
pub const SOURCE_TYPE_CREATED: &str = "story_extraction";

/// Marker for existing pages rewritten by a delta run
pub const SOURCE_TYPE_UPDATED: &str = "story_delta_update";

/// Render the final document for `page`
pub fn render_page(page: &PageState, policy: UpdatePolicy) -> String {
    debug!(path = %page.path, created = %page.created, %policy, "render_page: called");
    if policy.rewrites_document(page.created) {
        render_structured(page)
    } else {
        render_preserved(page)
    }
}

/// Original frontmatter kept byte-for-byte, content blocks appended
fn render_preserved(page: &PageState) -> String {
    let body = format!("{}\n", joined_blocks(page));
    match &page.original_frontmatter {
        Some(frontmatter) => format!("{}{}", fence_frontmatter(frontmatter), body),
        None => body,
    }
}

fn render_structured(page: &PageState) -> String {
    let mut title = sanitize_title(&page.title);
    if title.is_empty() {
        title = humanize_key(&page.page_key);
    }

    let mut lines = page.preserved_frontmatter_lines.clone();
    lines.push(format!("title: {}", yaml_quote(&title)));
    push_yaml_list(&mut lines, "aliases", &page.aliases);
    push_yaml_list(&mut lines, "keywords", &page.keywords);
    push_yaml_list(&mut lines, "tags", &page.tags);
    let source_type = if page.created {
        SOURCE_TYPE_CREATED
    } else {
        SOURCE_TYPE_UPDATED
    };
    lines.push(format!("sourceType: {}", yaml_quote(source_type)));
    lines.push(format!("pageKey: {}", yaml_quote(&page.page_key)));

    let joined = joined_blocks(page);
    // Hydrated bodies open with the heading rendered here; new pages hold
    // only model content
    let without_title = if page.created {
        joined.as_str()
    } else {
        strip_title_heading(&joined, &[title.as_str(), page.title.as_str()])
    };
    let without_summary = remove_summary_section(without_title);
    let sections = without_summary.trim();
    let sections = if sections.is_empty() || has_section_heading(sections) {
        sections.to_string()
    } else {
        format!("## {}\n\n{}", default_section_heading(&page.page_key), sections)
    };

    let mut body = format!("# {}\n\n{}", title, sections);
    if !page.summary.trim().is_empty() {
        body = upsert_summary_section(&body, &page.summary);
    }

    format!("{}\n{}\n", fence_frontmatter(&lines.join("\n")), body.trim_end())
}

fn joined_blocks(page: &PageState) -> String {
    page.content_blocks
        .iter()
        .map(|block| block.trim_end())
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

fn push_yaml_list(lines: &mut Vec<String>, key: &str, items: &[String]) {
    if items.is_empty() {
        lines.push(format!("{}: []", key));
        return;
    }
    lines.push(format!("{}:", key));
    lines.extend(items.iter().map(|item| format!("  - {}", yaml_quote(item))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::store::hydrate_page;
    use crate::delta::types::ExistingPage;

    fn new_page() -> PageState {
        PageState {
            path: "wiki/character-alice.md".to_string(),
            page_key: "character/alice".to_string(),
            title: "Character: Alice".to_string(),
            summary: "A courier.".to_string(),
            keywords: vec!["courier".to_string()],
            aliases: vec![],
            tags: vec!["lore".to_string(), "lorebook".to_string()],
            content_blocks: vec!["Alice carries letters.".to_string(), "She fears the tower.".to_string()],
            created: true,
            touched: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_render_new_page() {
        let text = render_page(&new_page(), UpdatePolicy::SafeAppend);
        let expected = "---\n\
title: \"Alice\"\n\
aliases: []\n\
keywords:\n  - \"courier\"\n\
tags:\n  - \"lore\"\n  - \"lorebook\"\n\
sourceType: \"story_extraction\"\n\
pageKey: \"character/alice\"\n\
---\n\
\n\
# Alice\n\
\n\
## Summary\n\
\n\
A courier.\n\
\n\
## Backstory\n\
\n\
Alice carries letters.\n\
\n\
---\n\
\n\
She fears the tower.\n";
        assert_eq!(text, expected);
        assert!(!text.contains("summary:"));
    }

    #[test]
    fn test_structured_render_is_fixed_point() {
        let first = render_page(&new_page(), UpdatePolicy::StructuredMerge);
        let mut hydrated = hydrate_page(&ExistingPage::new("wiki/character-alice.md", first.clone()));
        // Rehydrated pages are no longer new
        let second = render_page(&hydrated, UpdatePolicy::StructuredMerge);
        assert_eq!(
            second,
            first.replace(SOURCE_TYPE_CREATED, SOURCE_TYPE_UPDATED)
        );

        hydrated = hydrate_page(&ExistingPage::new("wiki/character-alice.md", second.clone()));
        assert_eq!(render_page(&hydrated, UpdatePolicy::StructuredMerge), second);
        assert_eq!(render_page(&hydrated, UpdatePolicy::SafeAppend), second);
    }

    #[test]
    fn test_safe_append_keeps_frontmatter_verbatim() {
        let original = "---\ntitle: Alice\ncustomField: 1\n---\n# Alice\n\nOld text.\n";
        let mut page = hydrate_page(&ExistingPage::new("wiki/alice.md", original));
        page.content_blocks.push("New text.".to_string());

        let text = render_page(&page, UpdatePolicy::SafeAppend);
        assert_eq!(
            text,
            "---\ntitle: Alice\ncustomField: 1\n---\n# Alice\n\nOld text.\n\n---\n\nNew text.\n"
        );
    }

    #[test]
    fn test_safe_append_never_injects_frontmatter() {
        let mut page = hydrate_page(&ExistingPage::new("wiki/plain.md", "Plain notes.\n"));
        page.content_blocks.push("More.".to_string());
        let text = render_page(&page, UpdatePolicy::SafeAppend);
        assert_eq!(text, "Plain notes.\n\n---\n\nMore.\n");
    }

    #[test]
    fn test_structured_merge_preserves_unmanaged_lines_first() {
        let original = "---\ncustomField: 1\nsummary: Legacy.\ntitle: Alice\n---\n# Alice\n\nOld text.\n";
        let page = hydrate_page(&ExistingPage::new("wiki/alice.md", original));
        let text = render_page(&page, UpdatePolicy::StructuredMerge);

        assert!(text.starts_with("---\ncustomField: 1\ntitle: \"Alice\"\n"));
        assert!(!text.contains("summary:"));
        assert!(text.contains("sourceType: \"story_delta_update\""));
        assert!(text.contains("# Alice\n\n## Summary\n\nLegacy.\n\n## Details\n\nOld text.\n"));
    }

    #[test]
    fn test_existing_sections_are_kept() {
        let mut page = new_page();
        page.content_blocks = vec!["## History\n\nBorn in winter.".to_string()];
        page.summary = String::new();
        let text = render_page(&page, UpdatePolicy::StructuredMerge);
        assert!(text.ends_with("# Alice\n\n## History\n\nBorn in winter.\n"));
    }

    #[test]
    fn test_model_heading_is_content() {
        let mut page = new_page();
        page.content_blocks = vec!["# Early life\nBorn in the tower.".to_string()];
        page.summary = String::new();
        let first = render_page(&page, UpdatePolicy::StructuredMerge);
        assert!(first.ends_with("# Alice\n\n## Backstory\n\n# Early life\nBorn in the tower.\n"));

        let hydrated = hydrate_page(&ExistingPage::new("wiki/character-alice.md", first.clone()));
        assert_eq!(hydrated.title, "Alice");
        let second = render_page(&hydrated, UpdatePolicy::StructuredMerge);
        assert_eq!(second, first.replace(SOURCE_TYPE_CREATED, SOURCE_TYPE_UPDATED));
    }

    #[test]
    fn test_new_page_keeps_heading_matching_title() {
        let mut page = new_page();
        page.content_blocks = vec!["# Alice\nShe carries letters.".to_string()];
        page.summary = String::new();
        let text = render_page(&page, UpdatePolicy::StructuredMerge);
        assert!(text.ends_with("# Alice\n\n## Backstory\n\n# Alice\nShe carries letters.\n"));
    }
}
