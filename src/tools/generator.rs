//! Text-to-SQL generation

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{CompletionRequest, LlmClient, RetryPolicy, with_retry};

use super::error::ToolError;

const SQL_SYSTEM_PROMPT: &str = "You translate questions into a single read-only SQLite query.\n\
Rules:\n\
- Reply with the SQL statement only, no explanation.\n\
- Use only the tables and columns listed in the schema.\n\
- Never modify data: SELECT (or WITH ... SELECT) only.\n\
- Match names case-insensitively, e.g. `name LIKE 'paula walker'`.\n\
- If the question cannot be answered from the schema, reply with an empty message.";

/// Turns a question and a schema description into SQL
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generate one statement; an empty string means nothing usable was produced
    async fn generate(&self, question: &str, schema: &str) -> Result<String, ToolError>;
}

/// SQL generation through an LLM
pub struct LlmSqlGenerator {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl LlmSqlGenerator {
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

    fn build_request(question: &str, schema: &str) -> CompletionRequest {
        CompletionRequest::new(SQL_SYSTEM_PROMPT)
            .with_user_message(format!("Schema:\n{}\nQuestion: {}\n\nSQL:", schema, question))
            .with_max_tokens(512)
            .with_temperature(0.0)
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate(&self, question: &str, schema: &str) -> Result<String, ToolError> {
        let response = with_retry(self.retry, "sql generation", || {
            self.client.complete(Self::build_request(question, schema))
        })
        .await?;

        let sql = strip_code_fences(&response.content);
        log::debug!("generated sql: {}", sql);
        Ok(sql)
    }
}

/// Remove Markdown code fences and a leading `SQL:` label from a model reply
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    let body = if let Some(rest) = trimmed.strip_prefix("```") {
        // drop the info string (e.g. "sql") on the opening line
        let rest = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        match rest.rfind("```") {
            Some(pos) => &rest[..pos],
            None => rest,
        }
    } else {
        trimmed
    };

    let body = body.trim();
    let body = body
        .strip_prefix("SQL:")
        .or_else(|| body.strip_prefix("sql:"))
        .unwrap_or(body);
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use std::time::Duration;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("SELECT 1"), "SELECT 1");
        assert_eq!(strip_code_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fences("```\nSELECT 2\n```\n"), "SELECT 2");
        assert_eq!(strip_code_fences("  SQL: SELECT 3 "), "SELECT 3");
        assert_eq!(strip_code_fences("```sql\nSELECT 4"), "SELECT 4");
        assert_eq!(strip_code_fences("   "), "");
    }

    #[tokio::test]
    async fn test_generate_prompts_with_schema_and_question() {
        let mock = Arc::new(MockLlmClient::new().with_fallback("```sql\nSELECT email FROM people\n```"));
        let generator = LlmSqlGenerator::new(mock.clone());

        let sql = generator
            .generate("What is Paula Walker's email?", "Table people:\n  - email (TEXT)\n")
            .await
            .unwrap();

        assert_eq!(sql, "SELECT email FROM people");
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].messages[0].content.contains("Table people:"));
        assert!(requests[0].messages[0].content.contains("Paula Walker"));
        assert_eq!(requests[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_generate_retries_rate_limit() {
        let mock = Arc::new(MockLlmClient::with_responses(vec![
            Err(LlmError::RateLimited {
                retry_after: Duration::from_millis(1),
            }),
            Ok("SELECT 1".to_string()),
        ]));
        let generator = LlmSqlGenerator::new(mock.clone())
            .with_retry_policy(RetryPolicy::default().with_backoff(Duration::from_millis(1)));

        assert_eq!(generator.generate("q", "s").await.unwrap(), "SELECT 1");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_generate_auth_error_not_retried() {
        let mock = Arc::new(MockLlmClient::with_responses(vec![Err(LlmError::Auth {
            status: 401,
            message: "bad key".to_string(),
        })]));
        let generator = LlmSqlGenerator::new(mock.clone());

        let err = generator.generate("q", "s").await.unwrap_err();
        assert!(matches!(err, ToolError::Llm(LlmError::Auth { .. })));
        assert_eq!(mock.call_count(), 1);
    }
}
