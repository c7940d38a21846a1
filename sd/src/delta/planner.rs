//! StoryDeltaPlanner - LLM-driven story-to-wiki delta planning
//!
//! Chunks a story, asks the model for page operations one chunk at a time,
//! and folds the operations into a `PageIdentityStore`. Chunks run strictly
//! in order: every prompt carries the page snapshot produced by the chunks
//! before it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::chunker::chunk_story;
use super::diff::build_diff_preview;
use super::error::PlanError;
use super::markdown::compute_tags;
use super::merge::merge_operation;
use super::parser::parse_operations;
use super::render::render_page;
use super::store::{PageIdentityStore, validate_target_folder};
use super::types::{
    Chunk, ChunkDiagnostic, PageAction, PlanOptions, PlanRequest, PlannedChange, PlannedPage, StoryDeltaPlan,
    UpdatePolicy,
};
use crate::llm::{LlmClient, call_model};
use crate::prompts::{ChunkPromptContext, PromptLoader};

/// Response token budget for one chunk
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// StoryDeltaPlanner turns story text into a reviewable set of page writes
pub struct StoryDeltaPlanner {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    max_tokens: u32,
}

impl StoryDeltaPlanner {
    /// Create a planner using the embedded prompts
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompts: PromptLoader::embedded_only(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLoader) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Plan a run that cannot be cancelled
    pub async fn plan(&self, request: &PlanRequest) -> Result<StoryDeltaPlan, PlanError> {
        self.plan_with_cancel(request, &CancellationToken::new()).await
    }

    /// Plan a run, aborting when `cancel` fires
    ///
    /// Cancellation is observed before each chunk and while waiting for the
    /// model. A chunk whose operations are being applied always finishes;
    /// a cancelled run returns no partial plan.
    pub async fn plan_with_cancel(
        &self,
        request: &PlanRequest,
        cancel: &CancellationToken,
    ) -> Result<StoryDeltaPlan, PlanError> {
        if request.story_markdown.trim().is_empty() {
            return Err(PlanError::EmptyStory);
        }
        let target_folder = validate_target_folder(&request.target_folder)?;
        validate_options(&request.options)?;

        let chunks = chunk_story(&request.story_markdown, request.options.max_chunk_chars);
        if chunks.is_empty() {
            return Err(PlanError::NoChunks);
        }
        info!(
            chunk_count = chunks.len(),
            existing_pages = request.existing_pages.len(),
            policy = %request.update_policy,
            "Planning story delta"
        );

        let system_prompt = self
            .prompts
            .system_prompt()
            .map_err(|e| PlanError::Prompt(e.to_string()))?;
        let mut store = PageIdentityStore::new(
            target_folder,
            &request.existing_pages,
            compute_tags(&request.tags),
        );
        let mut plan = StoryDeltaPlan {
            chunk_count: chunks.len(),
            ..Default::default()
        };

        for chunk in &chunks {
            if cancel.is_cancelled() {
                info!(chunk_index = chunk.index, "Planning cancelled");
                return Err(PlanError::Cancelled);
            }
            self.process_chunk(chunk, chunks.len(), &system_prompt, request, &mut store, &mut plan, cancel)
                .await?;
        }

        finalize(store, request.update_policy, &mut plan);
        info!(
            pages = plan.pages.len(),
            operations = plan.operation_count,
            skipped_low_confidence = plan.skipped_low_confidence,
            warnings = plan.warnings.len(),
            "Story delta planned"
        );
        Ok(plan)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_chunk(
        &self,
        chunk: &Chunk,
        chunk_total: usize,
        system_prompt: &str,
        request: &PlanRequest,
        store: &mut PageIdentityStore,
        plan: &mut StoryDeltaPlan,
        cancel: &CancellationToken,
    ) -> Result<(), PlanError> {
        debug!(chunk_index = chunk.index, chunk_len = chunk.text.len(), "process_chunk: called");
        let options = &request.options;
        let context = ChunkPromptContext {
            chunk_index: chunk.index,
            chunk_total,
            existing_pages_json: store.snapshot_json(options.max_existing_pages_in_prompt),
            chunk_markdown: chunk.text.clone(),
        };
        let user_prompt = self
            .prompts
            .render_user(&context)
            .map_err(|e| PlanError::Prompt(e.to_string()))?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(chunk_index = chunk.index, "Planning cancelled while awaiting model");
                return Err(PlanError::Cancelled);
            }
            result = call_model(self.llm.as_ref(), system_prompt, &user_prompt, self.max_tokens) => result,
        };

        let mut diagnostic = ChunkDiagnostic {
            chunk_index: chunk.index,
            operation_count: 0,
            warnings: Vec::new(),
        };

        let operations = match response
            .map_err(|e| e.to_string())
            .and_then(|text| parse_operations(&text, options.max_operations_per_chunk).map_err(|e| e.to_string()))
        {
            Ok(operations) => operations,
            Err(message) => {
                warn!(chunk_index = chunk.index, %message, "Chunk failed, continuing");
                push_warning(plan, &mut diagnostic, format!("Chunk {}: {}", chunk.index, message));
                plan.chunks.push(diagnostic);
                return Ok(());
            }
        };

        diagnostic.operation_count = operations.len();
        plan.operation_count += operations.len();

        for op in &operations {
            let idx = store.resolve_or_allocate(op)?;
            if op.confidence < options.low_confidence_threshold {
                store.page_mut(idx).skipped_low_confidence += 1;
                plan.skipped_low_confidence += 1;
                let message = format!(
                    "Chunk {}: skipped low-confidence operation for '{}' ({:.2} < {:.2})",
                    chunk.index, op.page_key, op.confidence, options.low_confidence_threshold
                );
                debug!(%message, "process_chunk: low confidence");
                push_warning(plan, &mut diagnostic, message);
                continue;
            }

            merge_operation(
                store.page_mut(idx),
                op,
                request.update_policy,
                chunk.index,
                options.max_summary_chars,
            );
            store.reindex_names(idx);
        }

        debug!(chunk_index = chunk.index, operation_count = operations.len(), "process_chunk: done");
        plan.chunks.push(diagnostic);
        Ok(())
    }
}

fn push_warning(plan: &mut StoryDeltaPlan, diagnostic: &mut ChunkDiagnostic, message: String) {
    diagnostic.warnings.push(message.clone());
    plan.warnings.push(message);
}

fn validate_options(options: &PlanOptions) -> Result<(), PlanError> {
    if options.max_chunk_chars == 0 {
        return Err(PlanError::InvalidOptions("max-chunk-chars must be positive".to_string()));
    }
    if options.max_summary_chars == 0 {
        return Err(PlanError::InvalidOptions("max-summary-chars must be positive".to_string()));
    }
    let threshold = options.low_confidence_threshold;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(PlanError::InvalidOptions(format!(
            "low-confidence-threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

/// Render touched pages and emit the ones whose text actually changes
fn finalize(store: PageIdentityStore, policy: UpdatePolicy, plan: &mut StoryDeltaPlan) {
    debug!(page_count = store.page_count(), %policy, "finalize: called");
    for page in store.into_pages() {
        if !page.touched {
            continue;
        }
        let content = render_page(&page, policy);
        if page.original_content.as_deref() == Some(content.as_str()) {
            debug!(path = %page.path, "finalize: rendered text unchanged, dropping");
            continue;
        }

        let action = if page.created {
            PageAction::Create
        } else {
            PageAction::Update
        };
        let diff = build_diff_preview(action, page.original_content.as_deref(), &content);

        plan.changes.push(PlannedChange {
            path: page.path.clone(),
            page_key: page.page_key.clone(),
            title: page.title.clone(),
            action,
            applied_operations: page.applied_operations,
            skipped_low_confidence: page.skipped_low_confidence,
            max_confidence: page.max_confidence,
            rationales: page.rationales.clone(),
            chunk_indices: page.chunk_indices.iter().copied().collect(),
            added_lines: diff.added_lines,
            removed_lines: diff.removed_lines,
        });
        plan.pages.push(PlannedPage {
            path: page.path,
            content,
            previous_content: page.original_content,
            page_key: page.page_key,
            action,
            diff,
        });
    }

    plan.pages.sort_by(|a, b| a.path.cmp(&b.path));
    plan.changes.sort_by(|a, b| a.path.cmp(&b.path));
}
