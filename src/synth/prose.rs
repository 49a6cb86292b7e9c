//! Optional LLM rewrite of the template answer

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{CompletionRequest, LlmClient, LlmError, RetryPolicy, with_retry};
use crate::question::Question;

const PROSE_SYSTEM_PROMPT: &str = "You are a knowledgeable assistant answering from retrieved context.\n\
Guidelines:\n\
1. Base your answer only on the provided context.\n\
2. If the context answers the question, answer it directly and completely.\n\
3. If the context is not sufficient, say so clearly.\n\
4. Combine database results and document passages when both are present.\n\
5. Be precise and factual; do not invent values.";

/// Turns the synthesizer's factual body into a natural answer
#[async_trait]
pub trait ProseWriter: Send + Sync {
    async fn write(&self, question: &Question, context: &str) -> Result<String, LlmError>;
}

pub struct LlmProseWriter {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl LlmProseWriter {
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
}

#[async_trait]
impl ProseWriter for LlmProseWriter {
    async fn write(&self, question: &Question, context: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Context:\n{}\n\nQuestion: {}\n\nAnswer:",
            context,
            question.render_with_context()
        );
        let response = with_retry(self.retry, "answer prose", || {
            self.client
                .complete(CompletionRequest::new(PROSE_SYSTEM_PROMPT).with_user_message(prompt.clone()))
        })
        .await?;
        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_prompt_contains_context_and_question() {
        let mock = Arc::new(MockLlmClient::new().with_fallback("  Paula's email is paula@example.com.  "));
        let writer = LlmProseWriter::new(mock.clone());
        let question = Question::new("What is Paula Walker's email address?").unwrap();

        let text = writer.write(&question, "email: paula@example.com").await.unwrap();

        assert_eq!(text, "Paula's email is paula@example.com.");
        let prompt = &mock.requests()[0].messages[0].content;
        assert!(prompt.starts_with("Context:\nemail: paula@example.com"));
        assert!(prompt.contains("Question: What is Paula Walker's email address?"));
    }
}
