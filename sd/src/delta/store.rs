//! Page identity store
//!
//! Owns every `PageState` of one planning run and the lookup maps that tie
//! page keys, titles, and paths together. Operations resolve to the same
//! page across chunks because the maps are updated as soon as a page is
//! allocated.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

use super::error::PlanError;
use super::markdown::{
    BLOCK_SEPARATOR, first_h1_title, humanize_key, normalize_page_key, normalize_title_key, parse_frontmatter,
    resolve_summary, safe_file_stem, sanitize_title, split_frontmatter,
};
use super::types::{ExistingPage, PageState, ParsedOperation};

/// Upper bound on numeric suffixes tried for a new path
pub const MAX_PATH_SUFFIX: usize = 10_000;

/// Compact view of a page handed to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub page_key: String,
    pub title: String,
    pub path: String,
    pub summary: String,
    pub aliases: Vec<String>,
    pub keywords: Vec<String>,
}

/// Run-scoped page state plus key/title/path indexes
#[derive(Debug)]
pub struct PageIdentityStore {
    pages: Vec<PageState>,
    by_key: BTreeMap<String, usize>,
    by_title: BTreeMap<String, usize>,
    used_paths: BTreeSet<String>,
    target_folder: String,
    new_page_tags: Vec<String>,
}

impl PageIdentityStore {
    /// Hydrate the store from the host's existing pages
    ///
    /// Pages are processed in path order. When two documents claim the same
    /// page key, the first one keeps it and the second is only reachable by
    /// path.
    pub fn new(target_folder: impl Into<String>, existing: &[ExistingPage], new_page_tags: Vec<String>) -> Self {
        let target_folder = target_folder.into();
        debug!(%target_folder, existing_count = existing.len(), "PageIdentityStore::new: called");

        let mut sorted: Vec<&ExistingPage> = existing.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut store = Self {
            pages: Vec::with_capacity(sorted.len()),
            by_key: BTreeMap::new(),
            by_title: BTreeMap::new(),
            used_paths: BTreeSet::new(),
            target_folder,
            new_page_tags,
        };

        for page in sorted {
            if !store.used_paths.insert(page.path.to_lowercase()) {
                debug!(path = %page.path, "PageIdentityStore::new: duplicate path, skipping");
                continue;
            }
            let state = hydrate_page(page);
            let idx = store.pages.len();
            if store.by_key.contains_key(&state.page_key) {
                debug!(page_key = %state.page_key, path = %state.path, "PageIdentityStore::new: duplicate page key, first wins");
            } else {
                store.by_key.insert(state.page_key.clone(), idx);
            }
            store.pages.push(state);
        }

        // Titles before aliases so a real title is never shadowed by an alias
        for idx in 0..store.pages.len() {
            let key = normalize_title_key(&store.pages[idx].title);
            store.index_title(key, idx);
        }
        for idx in 0..store.pages.len() {
            store.index_aliases(idx);
        }

        info!(page_count = store.pages.len(), "Hydrated page identity store");
        store
    }

    /// Resolve an operation to a page index, allocating a new page if needed
    pub fn resolve_or_allocate(&mut self, op: &ParsedOperation) -> Result<usize, PlanError> {
        debug!(page_key = %op.page_key, title = %op.title, "resolve_or_allocate: called");
        let title = sanitize_title(&op.title);
        let mut key = normalize_page_key(&op.page_key);
        if key.is_empty() {
            key = normalize_page_key(&title);
        }
        let title_key = normalize_title_key(&title);

        if let Some(&idx) = self.by_key.get(&key) {
            debug!(%key, path = %self.pages[idx].path, "resolve_or_allocate: matched by page key");
            return Ok(idx);
        }
        if !title_key.is_empty()
            && let Some(&idx) = self.by_title.get(&title_key)
        {
            debug!(%title_key, path = %self.pages[idx].path, "resolve_or_allocate: matched by title");
            return Ok(idx);
        }

        let path = self.allocate_path(&key)?;
        let display_title = if title.is_empty() { humanize_key(&key) } else { title };
        info!(%key, %path, "Allocating new page");

        let idx = self.pages.len();
        self.pages.push(PageState {
            path: path.clone(),
            page_key: key.clone(),
            title: display_title.clone(),
            tags: self.new_page_tags.clone(),
            created: true,
            ..Default::default()
        });
        self.used_paths.insert(path.to_lowercase());
        self.by_key.insert(key, idx);
        self.index_title(normalize_title_key(&display_title), idx);
        Ok(idx)
    }

    /// Register the current title and aliases of a page for lookups
    ///
    /// Names already bound to another page keep their binding.
    pub fn reindex_names(&mut self, idx: usize) {
        if idx >= self.pages.len() {
            return;
        }
        let key = normalize_title_key(&self.pages[idx].title);
        self.index_title(key, idx);
        self.index_aliases(idx);
    }

    fn index_title(&mut self, title_key: String, idx: usize) {
        if !title_key.is_empty() {
            self.by_title.entry(title_key).or_insert(idx);
        }
    }

    fn index_aliases(&mut self, idx: usize) {
        let keys: Vec<String> = self.pages[idx].aliases.iter().map(|a| normalize_title_key(a)).collect();
        for key in keys {
            self.index_title(key, idx);
        }
    }

    fn allocate_path(&self, key: &str) -> Result<String, PlanError> {
        let stem = safe_file_stem(key);
        let join = |name: String| {
            if self.target_folder.is_empty() {
                name
            } else {
                format!("{}/{}", self.target_folder, name)
            }
        };

        let first = join(format!("{}.md", stem));
        if !self.used_paths.contains(&first.to_lowercase()) {
            return Ok(first);
        }
        for suffix in 2..=MAX_PATH_SUFFIX {
            let candidate = join(format!("{}-{}.md", stem, suffix));
            if !self.used_paths.contains(&candidate.to_lowercase()) {
                debug!(%candidate, "allocate_path: resolved collision with suffix");
                return Ok(candidate);
            }
        }
        Err(PlanError::PathExhausted { stem })
    }

    pub fn page(&self, idx: usize) -> &PageState {
        &self.pages[idx]
    }

    pub fn page_mut(&mut self, idx: usize) -> &mut PageState {
        &mut self.pages[idx]
    }

    /// Pages known to the store, hydrated and allocated
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_pages(self) -> Vec<PageState> {
        self.pages
    }

    /// Pages the model should know about, sorted by key then path
    ///
    /// Pages allocated this run but never touched are left out.
    pub fn snapshot(&self, max_pages: usize) -> Vec<PageSnapshot> {
        let mut snapshot: Vec<PageSnapshot> = self
            .pages
            .iter()
            .filter(|p| !p.created || p.touched)
            .map(|p| PageSnapshot {
                page_key: p.page_key.clone(),
                title: p.title.clone(),
                path: p.path.clone(),
                summary: p.summary.clone(),
                aliases: p.aliases.clone(),
                keywords: p.keywords.clone(),
            })
            .collect();
        snapshot.sort_by(|a, b| (&a.page_key, &a.path).cmp(&(&b.page_key, &b.path)));
        snapshot.truncate(max_pages);
        snapshot
    }

    /// Snapshot serialized for the user prompt
    pub fn snapshot_json(&self, max_pages: usize) -> String {
        serde_json::to_string_pretty(&self.snapshot(max_pages)).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Build a `PageState` from a stored document
pub fn hydrate_page(page: &ExistingPage) -> PageState {
    let (frontmatter, body) = split_frontmatter(&page.content);
    let fm = frontmatter.map(parse_frontmatter).unwrap_or_default();

    let stem = Path::new(&page.path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let title = fm
        .title
        .clone()
        .or_else(|| first_h1_title(body))
        .unwrap_or_else(|| stem.clone());

    let mut page_key = normalize_page_key(fm.page_key.as_deref().unwrap_or(&title));
    if page_key.is_empty() {
        page_key = normalize_page_key(&stem);
    }
    if page_key.is_empty() {
        page_key = normalize_page_key(&page.path);
    }

    let content_blocks = if body.trim().is_empty() {
        Vec::new()
    } else {
        body.split(BLOCK_SEPARATOR).map(str::to_string).collect()
    };

    debug!(path = %page.path, %page_key, block_count = content_blocks.len(), "hydrate_page: done");
    PageState {
        path: page.path.clone(),
        page_key,
        title,
        summary: resolve_summary(body, fm.summary.as_deref()),
        keywords: fm.keywords,
        aliases: fm.aliases,
        tags: fm.tags,
        original_content: Some(page.content.clone()),
        original_frontmatter: frontmatter.map(str::to_string),
        preserved_frontmatter_lines: fm.preserved_lines,
        content_blocks,
        created: false,
        ..Default::default()
    }
}

/// Normalize the vault-relative folder for new pages
pub fn validate_target_folder(raw: &str) -> Result<String, PlanError> {
    let folder = raw.trim().replace('\\', "/");
    let invalid = || PlanError::InvalidTargetFolder(raw.to_string());

    if folder.is_empty() || folder.starts_with('/') || folder.contains(':') {
        return Err(invalid());
    }
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        return Err(invalid());
    }

    let illegal = |c: char| matches!(c, '<' | '>' | '"' | '|' | '?' | '*') || c.is_control();
    for segment in folder.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.chars().any(illegal) {
            return Err(invalid());
        }
    }
    Ok(folder.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(page_key: &str, title: &str) -> ParsedOperation {
        ParsedOperation {
            page_key: page_key.to_string(),
            title: title.to_string(),
            summary: String::new(),
            keywords: vec![],
            aliases: vec![],
            content: String::new(),
            confidence: 0.9,
            rationale: String::new(),
        }
    }

    #[test]
    fn test_hydrate_reads_managed_fields() {
        let page = ExistingPage::new(
            "wiki/character-alice.md",
            "---\ntitle: Alice\npageKey: \"character/alice\"\naliases:\n  - Al\ncustomField: 1\n---\n# Alice\n\n## Summary\n\nA courier.\n\n## Backstory\n\nBorn.\n\n---\n\nLater.\n",
        );
        let state = hydrate_page(&page);
        assert_eq!(state.page_key, "character/alice");
        assert_eq!(state.title, "Alice");
        assert_eq!(state.summary, "A courier.");
        assert_eq!(state.aliases, vec!["Al"]);
        assert_eq!(state.preserved_frontmatter_lines, vec!["customField: 1"]);
        assert_eq!(state.content_blocks.len(), 2);
        assert_eq!(state.content_blocks[1], "Later.\n");
        assert!(!state.created);
        assert!(state.original_content.is_some());
    }

    #[test]
    fn test_hydrate_falls_back_to_h1_then_stem() {
        let state = hydrate_page(&ExistingPage::new("wiki/x.md", "# The Old Tower\n\nStone.\n"));
        assert_eq!(state.title, "The Old Tower");
        assert_eq!(state.page_key, "the-old-tower");
        assert!(state.original_frontmatter.is_none());

        let state = hydrate_page(&ExistingPage::new("wiki/Misty Vale.md", "Just text.\n"));
        assert_eq!(state.title, "Misty Vale");
        assert_eq!(state.page_key, "misty-vale");
    }

    #[test]
    fn test_resolve_by_key_and_title() {
        let existing = vec![ExistingPage::new(
            "wiki/alice.md",
            "---\ntitle: Alice\npageKey: character/alice\n---\n# Alice\n",
        )];
        let mut store = PageIdentityStore::new("wiki", &existing, vec![]);

        assert_eq!(store.resolve_or_allocate(&op("Character/Alice ", "")).unwrap(), 0);
        assert_eq!(store.resolve_or_allocate(&op("someone-else", "Character: alice")).unwrap(), 0);
        assert_eq!(store.page_count(), 1);
    }

    #[test]
    fn test_allocation_is_remembered() {
        let mut store = PageIdentityStore::new("wiki", &[], vec!["lore".to_string()]);
        let first = store.resolve_or_allocate(&op("location/tower", "The Tower")).unwrap();
        let again = store.resolve_or_allocate(&op("", "the  tower")).unwrap();
        assert_eq!(first, again);

        let page = store.page(first);
        assert_eq!(page.path, "wiki/location-tower.md");
        assert_eq!(page.title, "The Tower");
        assert_eq!(page.tags, vec!["lore"]);
        assert!(page.created);
        assert!(!page.touched);
    }

    #[test]
    fn test_path_collisions_get_suffixes() {
        let existing = vec![
            ExistingPage::new("wiki/Location-Tower.md", "---\npageKey: other/one\n---\n"),
            ExistingPage::new("wiki/location-tower-2.md", "---\npageKey: other/two\n---\n"),
        ];
        let mut store = PageIdentityStore::new("wiki", &existing, vec![]);
        let idx = store.resolve_or_allocate(&op("location/tower", "")).unwrap();
        assert_eq!(store.page(idx).path, "wiki/location-tower-3.md");
        assert_eq!(store.page(idx).title, "Tower");

        let idx = store.resolve_or_allocate(&op("location-tower", "")).unwrap();
        assert_eq!(store.page(idx).path, "wiki/location-tower-4.md");
    }

    #[test]
    fn test_duplicate_key_first_path_wins() {
        let existing = vec![
            ExistingPage::new("wiki/b.md", "---\npageKey: dup\n---\n"),
            ExistingPage::new("wiki/a.md", "---\npageKey: dup\n---\n"),
        ];
        let mut store = PageIdentityStore::new("wiki", &existing, vec![]);
        let idx = store.resolve_or_allocate(&op("dup", "")).unwrap();
        assert_eq!(store.page(idx).path, "wiki/a.md");
    }

    #[test]
    fn test_aliases_resolve_after_reindex() {
        let mut store = PageIdentityStore::new("wiki", &[], vec![]);
        let idx = store.resolve_or_allocate(&op("character/alice", "Alice")).unwrap();
        store.page_mut(idx).aliases.push("The Courier".to_string());
        store.reindex_names(idx);
        assert_eq!(store.resolve_or_allocate(&op("", "the courier")).unwrap(), idx);
    }

    #[test]
    fn test_snapshot_skips_untouched_new_pages() {
        let existing = vec![ExistingPage::new("wiki/z.md", "---\npageKey: zeta\n---\n")];
        let mut store = PageIdentityStore::new("wiki", &existing, vec![]);
        let untouched = store.resolve_or_allocate(&op("alpha", "")).unwrap();
        let touched = store.resolve_or_allocate(&op("beta", "")).unwrap();
        store.page_mut(touched).touched = true;
        assert!(!store.page(untouched).touched);

        let keys: Vec<String> = store.snapshot(10).into_iter().map(|s| s.page_key).collect();
        assert_eq!(keys, vec!["beta", "zeta"]);
        assert_eq!(store.snapshot(1).len(), 1);
        assert!(store.snapshot_json(10).contains("\"pageKey\": \"beta\""));
    }

    #[test]
    fn test_validate_target_folder() {
        assert_eq!(validate_target_folder("wiki").unwrap(), "wiki");
        assert_eq!(validate_target_folder(" lore\\people/ ").unwrap(), "lore/people");
        assert!(validate_target_folder("").is_err());
        assert!(validate_target_folder("/abs").is_err());
        assert!(validate_target_folder("a/../b").is_err());
        assert!(validate_target_folder("C:/x").is_err());
        assert!(validate_target_folder("bad?name").is_err());
    }
}
