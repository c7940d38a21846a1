//! Prompt Template System
//!
//! Loads and renders the `.pmt` templates sent to the model for each story
//! chunk.
//!
//! Template loading chain:
//! 1. `<vault>/.storydelta/prompts/{name}.pmt` (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{ChunkPromptContext, PromptLoader};
