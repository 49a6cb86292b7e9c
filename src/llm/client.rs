//! Core LLM client trait and error taxonomy

use std::time::Duration;

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call is independent
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier used when the request does not name one
    fn model(&self) -> &str;
}

/// Errors that can occur during LLM operations
///
/// Rate limits, timeouts and auth failures are distinct variants so callers can retry
/// the first two and never the third.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl LlmError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: String) -> Self {
        match status {
            401 | 403 => LlmError::Auth {
                status,
                message: body,
            },
            429 => LlmError::RateLimited {
                retry_after: retry_after.unwrap_or(Duration::from_secs(1)),
            },
            408 | 504 => LlmError::Timeout,
            _ => LlmError::Api {
                status,
                message: body,
            },
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, LlmError::Auth { .. } | LlmError::MissingApiKey { .. })
    }

    /// Only rate limits and timeouts are retried
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limit() || self.is_timeout()
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_auth() {
        let err = LlmError::from_status(401, None, "bad key".to_string());
        assert!(err.is_auth());
        assert!(!err.is_retryable());

        let err = LlmError::from_status(403, None, "forbidden".to_string());
        assert!(err.is_auth());
    }

    #[test]
    fn test_from_status_rate_limit() {
        let err = LlmError::from_status(429, Some(Duration::from_secs(7)), String::new());
        assert_eq!(
            err,
            LlmError::RateLimited {
                retry_after: Duration::from_secs(7)
            }
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_status_timeout() {
        assert!(LlmError::from_status(408, None, String::new()).is_timeout());
        assert!(LlmError::from_status(504, None, String::new()).is_timeout());
    }

    #[test]
    fn test_server_error_not_retried() {
        let err = LlmError::from_status(500, None, "boom".to_string());
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_key_is_auth() {
        let err = LlmError::MissingApiKey {
            env_var: "OPENROUTER_API_KEY".to_string(),
        };
        assert!(err.is_auth());
        assert_eq!(
            err.to_string(),
            "Missing API key: environment variable OPENROUTER_API_KEY not set"
        );
    }
}
