//! Prompt Loader
//!
//! Loads prompt templates from a vault override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Variables available to the user prompt template
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPromptContext {
    /// 1-based index of the chunk
    pub chunk_index: usize,
    /// Number of chunks in the run
    pub chunk_total: usize,
    /// Page snapshot as pretty-printed JSON
    pub existing_pages_json: String,
    /// Raw chunk markdown
    pub chunk_markdown: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `<vault>/.storydelta/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that honors overrides under `<vault>/.storydelta/prompts/`
    pub fn new(vault: impl AsRef<Path>) -> Self {
        let user_dir = vault.as_ref().join(".storydelta").join("prompts");
        let user_dir_exists = user_dir.is_dir();
        debug!(?user_dir, %user_dir_exists, "PromptLoader::new: called");

        Self {
            hbs: Self::engine(),
            user_dir: user_dir_exists.then_some(user_dir),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; story markdown must reach the model unescaped
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks the user override first, then the embedded copy.
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// The system prompt, used verbatim
    pub fn system_prompt(&self) -> Result<String> {
        self.load_template("system")
    }

    /// Render the user prompt for one chunk
    pub fn render_user(&self, context: &ChunkPromptContext) -> Result<String> {
        debug!(
            chunk_index = %context.chunk_index,
            chunk_total = %context.chunk_total,
            "PromptLoader::render_user: called"
        );
        let template = self.load_template("user")?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template user: {}", e))
    }
}
