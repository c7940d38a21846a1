//! LLM Client module for StoryDelta
//!
//! Provides the model seam the planner calls once per story chunk.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
mod retry;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "anthropic" and "openai" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic, openai",
                other
            )))
        }
    }
}

/// Ask the model once and return its text answer
///
/// A response without any text is an error: the caller has nothing to parse.
pub async fn call_model(
    llm: &dyn LlmClient,
    system_prompt: &str,
    user_prompt: &str,
    max_tokens: u32,
) -> Result<String, LlmError> {
    debug!(user_prompt_len = user_prompt.len(), "call_model: called");
    let request = CompletionRequest::single_turn(system_prompt, user_prompt, max_tokens);
    let response = llm.complete(request).await?;
    match response.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(LlmError::InvalidResponse("model returned no text".to_string())),
    }
}
