//! LLM Client Layer - OpenAI-compatible chat completions
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - OpenRouterClient implementation
//! - Bounded retry for rate limits and timeouts
//! - A scripted MockLlmClient

pub mod client;
pub mod mock;
pub mod openrouter;
pub mod retry;
pub mod types;

pub use client::{LlmClient, LlmError};
pub use mock::MockLlmClient;
pub use openrouter::{OpenRouterClient, OpenRouterConfig};
pub use retry::{RetryPolicy, with_retry};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _role = Role::User;
        let _stop = StopReason::EndTurn;
        let _policy = RetryPolicy::default();
    }
}
