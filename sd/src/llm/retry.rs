//! Bounded retry around a single provider request

use std::future::Future;

use tracing::{debug, warn};

use super::{CompletionResponse, LlmError};

/// Retries after the first attempt
pub const MAX_RETRIES: u32 = 3;

/// Run `send` until it succeeds, fails for good, or retries run out
///
/// Each wait comes from the failing error: the server's `retry-after` for
/// rate limits, exponential backoff otherwise.
pub async fn with_retries<F, Fut>(mut send: F) -> Result<CompletionResponse, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CompletionResponse, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match send().await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                let delay = e.retry_delay(attempt);
                attempt += 1;
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "with_retries: retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(attempt, error = %e, "with_retries: giving up");
                return Err(e);
            }
        }
    }
}
