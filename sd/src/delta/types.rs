//! Data model for story delta planning

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// How pre-existing pages are updated
///
/// Consulted at exactly two points: metadata-merge eligibility
/// ([`UpdatePolicy::merges_metadata`]) and frontmatter-rewrite eligibility
/// ([`UpdatePolicy::rewrites_document`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Keep existing metadata, only append content
    SafeAppend,
    /// Regenerate metadata and structured sections
    #[default]
    StructuredMerge,
}

impl UpdatePolicy {
    /// Whether title/summary/keywords/aliases may change on this page
    pub fn merges_metadata(&self, page_created: bool) -> bool {
        page_created || *self == UpdatePolicy::StructuredMerge
    }

    /// Whether the renderer rebuilds frontmatter and body from scratch
    pub fn rewrites_document(&self, page_created: bool) -> bool {
        self.merges_metadata(page_created)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdatePolicy::SafeAppend => "safe_append",
            UpdatePolicy::StructuredMerge => "structured_merge",
        }
    }
}

impl std::fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "UpdatePolicy::from_str: called");
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "safe_append" | "append" => Ok(UpdatePolicy::SafeAppend),
            "structured_merge" | "merge" => Ok(UpdatePolicy::StructuredMerge),
            _ => Err(format!("Unknown update policy: {}. Use: safe_append or structured_merge", s)),
        }
    }
}

/// Numeric knobs for one planning run
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOptions {
    pub max_chunk_chars: usize,
    pub max_summary_chars: usize,
    pub max_operations_per_chunk: usize,
    pub max_existing_pages_in_prompt: usize,
    pub low_confidence_threshold: f64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 6000,
            max_summary_chars: 320,
            max_operations_per_chunk: 12,
            max_existing_pages_in_prompt: 80,
            low_confidence_threshold: 0.35,
        }
    }
}

/// Inputs for the tag list attached to newly created pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOptions {
    pub default_tags_raw: String,
    pub lorebook_scopes: Vec<String>,
    pub tag_prefix: String,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            default_tags_raw: "lore".to_string(),
            lorebook_scopes: Vec::new(),
            tag_prefix: "lorebook".to_string(),
        }
    }
}

/// A page as read from storage by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingPage {
    pub path: String,
    pub content: String,
}

impl ExistingPage {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Everything one planning run needs besides the model
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// Story text, already stripped of inline control directives
    pub story_markdown: String,
    /// Vault-relative folder for new pages
    pub target_folder: String,
    /// Full current text of every candidate page
    pub existing_pages: Vec<ExistingPage>,
    pub update_policy: UpdatePolicy,
    pub options: PlanOptions,
    pub tags: TagOptions,
}

impl PlanRequest {
    pub fn new(story_markdown: impl Into<String>, target_folder: impl Into<String>) -> Self {
        Self {
            story_markdown: story_markdown.into(),
            target_folder: target_folder.into(),
            existing_pages: Vec::new(),
            update_policy: UpdatePolicy::default(),
            options: PlanOptions::default(),
            tags: TagOptions::default(),
        }
    }

    pub fn with_existing_pages(mut self, pages: Vec<ExistingPage>) -> Self {
        self.existing_pages = pages;
        self
    }

    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn with_options(mut self, options: PlanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tags(mut self, tags: TagOptions) -> Self {
        self.tags = tags;
        self
    }
}

/// One ordered slice of the story
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// 1-based emission order
    pub index: usize,
    pub text: String,
}

/// One validated model-proposed update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedOperation {
    pub page_key: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub aliases: Vec<String>,
    pub content: String,
    pub confidence: f64,
    pub rationale: String,
}

/// Mutable per-run state of one logical page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageState {
    pub path: String,
    pub page_key: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    /// Full document text as loaded; `None` for pages created this run
    pub original_content: Option<String>,
    /// Raw frontmatter between the fences, if the document had any
    pub original_frontmatter: Option<String>,
    /// Unmanaged frontmatter lines, verbatim and in order
    pub preserved_frontmatter_lines: Vec<String>,
    pub content_blocks: Vec<String>,
    pub created: bool,
    pub touched: bool,
    pub max_confidence: f64,
    pub rationales: Vec<String>,
    pub chunk_indices: BTreeSet<usize>,
    pub applied_operations: usize,
    pub skipped_low_confidence: usize,
}

/// Create vs update of a planned page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAction {
    Create,
    Update,
}

impl std::fmt::Display for PageAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageAction::Create => write!(f, "create"),
            PageAction::Update => write!(f, "update"),
        }
    }
}

/// Unified-diff-style preview between two document versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffPreview {
    pub added_lines: usize,
    pub removed_lines: usize,
    pub preview: String,
    pub truncated: bool,
}

/// A page the host may write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedPage {
    pub path: String,
    pub content: String,
    pub previous_content: Option<String>,
    pub page_key: String,
    pub action: PageAction,
    pub diff: DiffPreview,
}

/// Audit record mirroring a planned page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedChange {
    pub path: String,
    pub page_key: String,
    pub title: String,
    pub action: PageAction,
    pub applied_operations: usize,
    pub skipped_low_confidence: usize,
    pub max_confidence: f64,
    pub rationales: Vec<String>,
    pub chunk_indices: Vec<usize>,
    pub added_lines: usize,
    pub removed_lines: usize,
}

/// Per-chunk outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDiagnostic {
    pub chunk_index: usize,
    pub operation_count: usize,
    pub warnings: Vec<String>,
}

/// Result of one planning run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDeltaPlan {
    pub pages: Vec<PlannedPage>,
    pub changes: Vec<PlannedChange>,
    pub chunks: Vec<ChunkDiagnostic>,
    pub warnings: Vec<String>,
    pub skipped_low_confidence: usize,
    pub chunk_count: usize,
    pub operation_count: usize,
}

impl StoryDeltaPlan {
    /// Nothing to apply
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
