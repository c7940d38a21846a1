//! Wiki-markdown helpers
//!
//! Page keys, titles, frontmatter, and the dedicated "Summary" section. All
//! functions here are pure and deterministic.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::types::TagOptions;

/// Marker appended to a cut summary
pub const ELLIPSIS: &str = "...";

/// Separator between content blocks in a page body
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Frontmatter keys the engine owns; everything else is preserved verbatim
pub const MANAGED_KEYS: [&str; 7] = ["title", "summary", "pageKey", "keywords", "aliases", "tags", "sourceType"];

/// Heading of the dedicated summary section
pub const SUMMARY_HEADING: &str = "Summary";

static TYPE_LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:character|faction|location|place|item|artifact|organi[sz]ation|npc|person|group|event|concept|creature|species|region|city)(?:\s*:\s*|\s+[-–—]\s+)",
    )
    .expect("type label regex is valid")
});

/// Normalize a raw key or title into a page-key slug
///
/// Lowercase, `/`-separated, only `[a-z0-9/_-]`. Whitespace and punctuation
/// become single dashes; empty segments disappear. A segment written only in
/// non-ASCII letters is spelled as its code points (`魔法` -> `u9b54-u6cd5`).
pub fn normalize_page_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('\\', "/");
    lowered
        .split('/')
        .map(|segment| {
            let slug = ascii_slug(segment);
            if slug.is_empty() { codepoint_slug(segment) } else { slug }
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn ascii_slug(segment: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else if c == '-' || c.is_whitespace() || c.is_ascii_punctuation() {
            pending_dash = true;
        }
    }
    out
}

fn codepoint_slug(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| format!("u{:x}", c as u32))
        .collect::<Vec<_>>()
        .join("-")
}

/// Lookup key for a display title
pub fn normalize_title_key(title: &str) -> String {
    collapse_whitespace(&sanitize_title(title)).to_lowercase()
}

/// Strip leading type labels such as "Character:" or "Faction -"
pub fn sanitize_title(title: &str) -> String {
    let trimmed = collapse_whitespace(title);
    let stripped = TYPE_LABEL_PREFIX.replace(&trimmed, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        trimmed
    } else {
        stripped.to_string()
    }
}

/// Filesystem-safe stem derived from a normalized page key
pub fn safe_file_stem(page_key: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for c in page_key.to_lowercase().chars() {
        if matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*') || c.is_control() {
            continue;
        }
        if c == '/' || c == '\\' || c == '-' || c.is_whitespace() {
            pending_dash = true;
            continue;
        }
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.push(c);
    }
    let out = out.trim_matches(|c| c == '-' || c == '.').to_string();
    if out.is_empty() { "page".to_string() } else { out }
}

/// Readable title from the last segment of a page key
pub fn humanize_key(page_key: &str) -> String {
    let last = page_key.rsplit('/').next().unwrap_or(page_key);
    last.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Default body heading, inferred from the first segment of the page key
pub fn default_section_heading(page_key: &str) -> &'static str {
    let segment = page_key.split('/').next().unwrap_or("");
    let token = segment.split('-').next().unwrap_or(segment);
    for candidate in [segment, token] {
        match candidate {
            "character" | "characters" | "person" | "people" | "npc" | "npcs" => return "Backstory",
            "location" | "locations" | "place" | "places" | "region" | "regions" | "city" | "cities" | "faction"
            | "factions" | "organization" | "organizations" | "group" | "groups" => return "Overview",
            "item" | "items" | "artifact" | "artifacts" | "object" | "objects" | "weapon" | "weapons" => {
                return "Description";
            }
            _ => {}
        }
    }
    "Details"
}

/// Case-insensitive de-duplication, first occurrence wins
pub fn dedupe_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and whitespace-insensitive form used for containment tests
pub fn normalize_for_containment(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Clamp a summary to `max_chars`, cutting on a word boundary
///
/// Truncated summaries end in `...`; the result never exceeds `max_chars`.
pub fn clamp_summary(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    if max_chars <= ELLIPSIS.len() {
        return collapsed.chars().take(max_chars).collect();
    }

    let budget = max_chars - ELLIPSIS.len();
    let head: String = collapsed.chars().take(budget).collect();
    let at_boundary = collapsed.chars().nth(budget).is_none_or(char::is_whitespace);
    let cut = if at_boundary {
        head.as_str()
    } else {
        match head.rfind(' ') {
            Some(idx) if idx > 0 => &head[..idx],
            _ => head.as_str(),
        }
    };
    // Never end on a dangling " | " join
    let cut = cut.trim_end_matches(|c: char| c.is_whitespace() || c == '|');
    format!("{}{}", cut, ELLIPSIS)
}

/// Tags attached to newly created pages
pub fn compute_tags(options: &TagOptions) -> Vec<String> {
    let mut tags: Vec<String> = options
        .default_tags_raw
        .split([',', '\n', ';'])
        .flat_map(|part| {
            let part = part.trim();
            // "#a #b" lists are whitespace separated
            if part.starts_with('#') {
                part.split_whitespace().map(str::to_string).collect::<Vec<_>>()
            } else {
                vec![part.to_string()]
            }
        })
        .map(|t| t.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let prefix = options.tag_prefix.trim().trim_matches('/');
    let scopes: Vec<&str> = options
        .lorebook_scopes
        .iter()
        .map(|s| s.trim().trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect();

    if scopes.is_empty() {
        if !prefix.is_empty() {
            tags.push(prefix.to_string());
        }
    } else {
        for scope in scopes {
            if prefix.is_empty() {
                tags.push(scope.to_string());
            } else {
                tags.push(format!("{}/{}", prefix, scope));
            }
        }
    }

    dedupe_case_insensitive(tags)
}

/// Quote a string as a YAML double-quoted scalar
pub fn yaml_quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.replace('"', "'")))
}

/// Split a document into its frontmatter (between `---` fences) and body
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---\n") else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == "---" {
            let frontmatter = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(frontmatter.strip_suffix('\n').unwrap_or(frontmatter)), body);
        }
        offset += line.len();
    }
    (None, content)
}

/// Wrap raw frontmatter in `---` fences
pub fn fence_frontmatter(frontmatter: &str) -> String {
    if frontmatter.is_empty() {
        "---\n---\n".to_string()
    } else {
        format!("---\n{}\n---\n", frontmatter)
    }
}

/// Managed fields read from a page's frontmatter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub page_key: Option<String>,
    pub keywords: Vec<String>,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    pub source_type: Option<String>,
    /// Unmanaged lines, verbatim and in order
    pub preserved_lines: Vec<String>,
}

/// Parse frontmatter into managed fields plus verbatim unmanaged lines
///
/// Each top-level `key:` line starts an entry; indented and `- ` lines
/// belong to the entry above them.
pub fn parse_frontmatter(raw: &str) -> Frontmatter {
    let mut entries: Vec<(Option<&str>, Vec<&str>)> = Vec::new();
    for line in raw.lines() {
        if let Some(key) = top_level_key(line) {
            entries.push((Some(key), vec![line]));
            continue;
        }
        let continuation = line.is_empty() || line.starts_with(char::is_whitespace) || line.starts_with("- ");
        match entries.last_mut() {
            Some((_, lines)) if continuation => lines.push(line),
            _ => entries.push((None, vec![line])),
        }
    }

    let mut fm = Frontmatter::default();
    for (key, lines) in entries {
        let Some(key) = key.filter(|k| MANAGED_KEYS.contains(k)) else {
            fm.preserved_lines.extend(lines.iter().map(|l| l.to_string()));
            continue;
        };

        let value = serde_yaml::from_str::<serde_yaml::Value>(&lines.join("\n"))
            .ok()
            .and_then(|doc| doc.get(key).cloned())
            .unwrap_or(serde_yaml::Value::Null);
        debug!(%key, "parse_frontmatter: managed key");

        match key {
            "title" => fm.title = yaml_scalar(&value),
            "summary" => fm.summary = yaml_scalar(&value),
            "pageKey" => fm.page_key = yaml_scalar(&value),
            "sourceType" => fm.source_type = yaml_scalar(&value),
            "keywords" => fm.keywords = yaml_list(&value),
            "aliases" => fm.aliases = yaml_list(&value),
            "tags" => fm.tags = yaml_list(&value),
            _ => {}
        }
    }
    fm
}

fn top_level_key(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) || line.starts_with('-') || line.starts_with('#') {
        return None;
    }
    let colon = line.find(':')?;
    let key = &line[..colon];
    let after = &line[colon + 1..];
    let valid_key = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    let valid_after = after.is_empty() || after.starts_with(char::is_whitespace);
    (valid_key && valid_after).then_some(key)
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    let s = match value {
        serde_yaml::Value::String(s) => s.trim().to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn yaml_list(value: &serde_yaml::Value) -> Vec<String> {
    let items = match value {
        serde_yaml::Value::Sequence(seq) => seq.iter().filter_map(yaml_scalar).collect(),
        other => yaml_scalar(other)
            .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
            .unwrap_or_default(),
    };
    dedupe_case_insensitive(items)
}

/// Title from the first `# ` heading of a body
pub fn first_h1_title(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Drop a leading `# Heading` line (after any blank lines) naming the page
///
/// Only a heading equal to one of `titles`, ignoring case and spacing, is
/// removed. Any other leading H1 is content and stays.
pub fn strip_title_heading<'a>(body: &'a str, titles: &[&str]) -> &'a str {
    let trimmed = body.trim_start();
    let (first, rest) = match trimmed.find('\n') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => (trimmed, ""),
    };
    let Some(heading) = first.strip_prefix("# ") else {
        return body;
    };
    let heading = collapse_whitespace(heading).to_lowercase();
    if titles.iter().any(|t| collapse_whitespace(t).to_lowercase() == heading) {
        rest
    } else {
        body
    }
}

/// Whether the text has at least one `## ` section heading
pub fn has_section_heading(text: &str) -> bool {
    text.lines().any(|line| line.starts_with("## "))
}

/// Byte range of the `## Summary` section: heading line through the line
/// before the next `#`/`##` heading
fn summary_section_range(body: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    let mut start = None;
    for line in body.split_inclusive('\n') {
        let text = line.trim_end();
        match start {
            None => {
                let is_summary = text
                    .strip_prefix("## ")
                    .is_some_and(|heading| heading.trim().eq_ignore_ascii_case(SUMMARY_HEADING));
                if is_summary {
                    start = Some(offset);
                }
            }
            Some(s) => {
                if text.starts_with("# ") || text.starts_with("## ") {
                    return Some((s, offset));
                }
            }
        }
        offset += line.len();
    }
    start.map(|s| (s, body.len()))
}

/// Text of the dedicated summary section, if any
pub fn extract_summary_section(body: &str) -> Option<String> {
    let (start, end) = summary_section_range(body)?;
    let section = &body[start..end];
    let text = section.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Body with the summary section removed
pub fn remove_summary_section(body: &str) -> String {
    match summary_section_range(body) {
        Some((start, end)) => format!("{}{}", &body[..start], &body[end..]),
        None => body.to_string(),
    }
}

/// Replace the summary section, or insert one right after the `# Title` line
pub fn upsert_summary_section(body: &str, summary: &str) -> String {
    let section = format!("## {}\n\n{}\n\n", SUMMARY_HEADING, summary.trim());
    if let Some((start, end)) = summary_section_range(body) {
        return format!("{}{}{}", &body[..start], section, &body[end..]);
    }

    let mut insert_at = 0;
    let mut seen_h1 = false;
    for line in body.split_inclusive('\n') {
        if !seen_h1 {
            if line.starts_with("# ") {
                seen_h1 = true;
                insert_at += line.len();
                continue;
            }
            if line.trim().is_empty() {
                insert_at += line.len();
                continue;
            }
            // No title line at the top: insert at the very beginning
            insert_at = 0;
            break;
        }
        if !line.trim().is_empty() {
            break;
        }
        insert_at += line.len();
    }
    if seen_h1 && insert_at == body.len() && !body.ends_with('\n') {
        return format!("{}\n\n{}", body, section);
    }
    format!("{}{}{}", &body[..insert_at], section, &body[insert_at..])
}

/// Summary precedence: dedicated body section first, legacy frontmatter second
pub fn resolve_summary(body: &str, frontmatter_summary: Option<&str>) -> String {
    extract_summary_section(body)
        .or_else(|| frontmatter_summary.map(str::to_string))
        .map(|s| collapse_whitespace(&s))
        .unwrap_or_default()
}
