//! Bounded retry for LLM calls.
//!
//! Only rate limits and timeouts are retried. The delay before a retry is the larger of
//! the configured backoff and the server's `retry-after` hint, capped at `max_backoff`.

use std::future::Future;
use std::time::Duration;

use super::client::LlmError;

/// How many times, and how long to wait, before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before retrying after `err`
    pub fn delay_for(&self, err: &LlmError) -> Duration {
        let hinted = match err {
            LlmError::RateLimited { retry_after } => (*retry_after).min(self.max_backoff),
            _ => Duration::ZERO,
        };
        self.backoff.max(hinted).min(self.max_backoff)
    }
}

/// Run `op`, retrying retryable failures according to `policy`
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(&err);
                log::warn!(
                    "{}: {} (retry {}/{} in {:?})",
                    label,
                    err,
                    attempt,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
