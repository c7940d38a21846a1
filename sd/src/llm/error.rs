//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Wait used when a 429 carries no usable `retry-after` header
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// Upper bound on a server-requested wait
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(120);

/// First backoff step for transient failures; doubles per attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Classify a non-success HTTP status
    ///
    /// `retry_after` is the raw `retry-after` header value, in seconds.
    pub fn from_status(status: u16, retry_after: Option<&str>, message: String) -> Self {
        if status == 429 {
            let wait = retry_after
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RATE_LIMIT_WAIT)
                .min(MAX_RATE_LIMIT_WAIT);
            return LlmError::RateLimited { retry_after: wait };
        }
        LlmError::ApiError { status, message }
    }

    /// Whether sending the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status == 408 || *status >= 500,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
        }
    }

    /// Server-requested wait, only known for rate limits
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Wait before retry number `attempt + 1` (0-based `attempt`)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_after()
            .unwrap_or_else(|| INITIAL_BACKOFF * 2u32.saturating_pow(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_rate_limit() {
        let err = LlmError::from_status(429, Some("7"), String::new());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));

        let err = LlmError::from_status(429, Some("Wed, 21 Oct 2015 07:28:00 GMT"), String::new());
        assert_eq!(err.retry_after(), Some(DEFAULT_RATE_LIMIT_WAIT));

        let err = LlmError::from_status(429, Some("86400"), String::new());
        assert_eq!(err.retry_after(), Some(MAX_RATE_LIMIT_WAIT));
    }

    #[test]
    fn test_from_status_api_error() {
        let err = LlmError::from_status(529, None, "overloaded".to_string());
        assert!(matches!(err, LlmError::ApiError { status: 529, .. }));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::from_status(408, None, String::new()).is_retryable());
        assert!(LlmError::from_status(429, None, String::new()).is_retryable());
        assert!(!LlmError::from_status(400, None, "Bad request".to_string()).is_retryable());
        assert!(!LlmError::from_status(401, None, String::new()).is_retryable());
        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!LlmError::InvalidResponse("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_delay() {
        let limited = LlmError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(limited.retry_delay(0), Duration::from_secs(42));
        assert_eq!(limited.retry_delay(3), Duration::from_secs(42));

        let server = LlmError::from_status(503, None, String::new());
        assert_eq!(server.retry_delay(0), Duration::from_millis(1000));
        assert_eq!(server.retry_delay(2), Duration::from_millis(4000));
    }
}
