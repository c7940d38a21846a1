//! LLM request/response types for StoryDelta
//!
//! Extraction is a single-shot text exchange: one system prompt, one user
//! message, one text answer. The types stay provider-agnostic so both the
//! Anthropic and OpenAI clients can share them.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (fixed extraction contract)
    pub system_prompt: String,

    /// User messages (one per chunk)
    pub messages: Vec<Message>,

    /// Max tokens for response (from config)
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build the request behind a `callModel(system, user)` exchange
    pub fn single_turn(system_prompt: impl Into<String>, user_prompt: impl Into<String>, max_tokens: u32) -> Self {
        debug!(%max_tokens, "CompletionRequest::single_turn: called");
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![Message::user(user_prompt)],
            max_tokens,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text content (if any)
    pub content: Option<String>,

    /// Why the model stopped
    pub stop_reason: StopReason,

    /// Token usage for cost tracking
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Plain text response, as produced by test doubles
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Parse from Anthropic API stop_reason string
    pub fn from_anthropic(s: &str) -> Self {
        debug!(%s, "StopReason::from_anthropic: called");
        match s {
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }

    /// Parse from OpenAI API finish_reason string
    pub fn from_openai(s: Option<&str>) -> Self {
        debug!(?s, "StopReason::from_openai: called");
        match s {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }
}

/// Token usage for cost tracking
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
