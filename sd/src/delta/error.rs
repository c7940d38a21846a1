//! Planning error types
//!
//! `PlanError` aborts a run. `OperationParseError` is chunk-local: the
//! planner turns it into a warning and moves on.

use thiserror::Error;

/// Fatal errors that abort a planning run
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Story markdown is empty")]
    EmptyStory,

    #[error("Invalid target folder '{0}'")]
    InvalidTargetFolder(String),

    #[error("Story produced no chunks")]
    NoChunks,

    #[error("Invalid plan options: {0}")]
    InvalidOptions(String),

    #[error("Unable to allocate a free page path for stem '{stem}'")]
    PathExhausted { stem: String },

    #[error("Planning run was cancelled")]
    Cancelled,

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),
}

/// Chunk-local failures while reading a model response
#[derive(Debug, Error)]
pub enum OperationParseError {
    #[error("No JSON payload found in model output")]
    PayloadNotFound,

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Model output has no 'operations' array")]
    MissingOperations,
}
