//! StoryDelta - story-to-wiki delta planning
//!
//! StoryDelta reads new narrative markdown, asks a language model which wiki
//! pages the story touches, and produces a reviewable plan of page creations
//! and updates. Everything the model returns is validated before it is
//! merged into a page.
//!
//! # Modules
//!
//! - [`delta`] - Chunking, parsing, page identity, merge, render, diff, planner
//! - [`llm`] - LLM client trait and provider implementations
//! - [`prompts`] - Prompt templates sent with each chunk
//! - [`vault`] - Loading pages from and writing plans to a directory
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod delta;
pub mod llm;
pub mod prompts;
pub mod vault;

// Re-export commonly used types
pub use config::{Config, LlmConfig, PlanConfig};
pub use delta::{
    ExistingPage, OperationParseError, PlanError, PlanOptions, PlanRequest, PlannedChange, PlannedPage,
    StoryDeltaPlan, StoryDeltaPlanner, TagOptions, UpdatePolicy,
};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
