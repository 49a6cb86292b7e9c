//! Scripted LLM client for tests and offline runs

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{LlmClient, LlmError};
use super::types::{CompletionRequest, CompletionResponse};

/// Returns scripted responses in order, then the fallback (if any)
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a sequence of outcomes
    pub fn with_responses(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    /// Text returned once the script is exhausted
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn push_ok(&self, text: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(text.into()));
        }
    }

    pub fn push_err(&self, err: LlmError) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(err));
        }
    }

    /// Number of completion calls made so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests received, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self.responses.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(result) => result.map(CompletionResponse::text),
            None => self
                .fallback
                .clone()
                .map(CompletionResponse::text)
                .ok_or_else(|| LlmError::InvalidResponse("no scripted response left".to_string())),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
