//! LLM tie-breaker for questions with no routing signal

use std::sync::Arc;

use crate::llm::{CompletionRequest, LlmClient, RetryPolicy, with_retry};
use crate::tools::Capability;

const ROUTING_SYSTEM_PROMPT: &str = "You route questions to data sources.\n\
Sources:\n\
- structured: a database of people with names, emails, phone numbers, birthdays, addresses and other fields; \
good for specific people, filters, counts and statistics.\n\
- unstructured: documents such as policies, procedures, guidelines, terms and conditions and institutional information.\n\
Reply with exactly one word: structured, unstructured, or both.";

/// Asks an LLM which capabilities a question needs
pub struct LlmRouteClassifier {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl LlmRouteClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Capabilities the model picked; None when the call fails or the reply is unclear
    pub async fn classify(&self, question: &str) -> Option<Vec<Capability>> {
        let response = with_retry(self.retry, "route fallback", || {
            self.client.complete(
                CompletionRequest::new(ROUTING_SYSTEM_PROMPT)
                    .with_user_message(question)
                    .with_max_tokens(8)
                    .with_temperature(0.0),
            )
        })
        .await;

        match response {
            Ok(r) => {
                let parsed = parse_route(&r.content);
                if parsed.is_none() {
                    log::warn!("route fallback gave an unusable reply: {:?}", r.content);
                }
                parsed
            }
            Err(e) => {
                log::warn!("route fallback failed, keeping default: {}", e);
                None
            }
        }
    }
}

/// Parse "structured" / "unstructured" / "both"
pub fn parse_route(reply: &str) -> Option<Vec<Capability>> {
    let word = reply
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    match word.as_str() {
        "structured" | "sql" => Some(vec![Capability::Structured]),
        "unstructured" | "documents" => Some(vec![Capability::Unstructured]),
        "both" => Some(vec![Capability::Structured, Capability::Unstructured]),
        _ => None,
    }
}
