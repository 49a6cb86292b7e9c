//! OpenRouter (OpenAI-compatible) chat-completions client
//!
//! Implements the LlmClient trait against any endpoint that speaks the
//! `/chat/completions` wire format. OpenRouter is the default.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, StopReason, Usage};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model to use
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Configuration for the OpenRouter client
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenRouter API client
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    config: OpenRouterConfig,
    usage: Arc<Mutex<Usage>>,
}

impl OpenRouterClient {
    /// Create a new client, reading the API key from `api_key_env`
    pub fn from_env(api_key_env: &str, config: OpenRouterConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(api_key_env).map_err(|_| LlmError::MissingApiKey {
            env_var: api_key_env.to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenRouterConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the request body
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);

        let mut messages: Vec<Value> = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system }));
        }
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
        );

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("choice has no text content".to_string()))?
            .to_string();

        let stop_reason = StopReason::from_finish_reason(choice["finish_reason"].as_str());

        let usage = body
            .get("usage")
            .map(|u| {
                Usage::new(
                    u["prompt_tokens"].as_u64().unwrap_or(0),
                    u["completion_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        if let Ok(mut total) = self.usage.lock() {
            total.add(&usage);
        }

        Ok(CompletionResponse {
            content,
            stop_reason,
            usage,
        })
    }

    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("X-Title", "ragsql")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::from_status(status.as_u16(), retry_after, error_body));
        }

        Ok(response.json().await?)
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        log::debug!("LLM request to {} (model {})", self.endpoint(), body["model"]);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> OpenRouterClient {
        OpenRouterClient::with_api_key("test-key".to_string(), OpenRouterConfig::default()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = OpenRouterConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_from_env_missing_key() {
        let err = OpenRouterClient::from_env("RAGSQL_TEST_KEY_THAT_IS_NEVER_SET", OpenRouterConfig::default())
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = OpenRouterConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let client = OpenRouterClient::with_api_key("k".to_string(), config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_build_request_puts_system_first() {
        let client = test_client();
        let request = CompletionRequest::new("You write SQL").with_user_message("Count rows");

        let body = client.build_request(&request);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You write SQL");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Count rows");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_build_request_without_system() {
        let client = test_client();
        let request = CompletionRequest::default().with_user_message("hi");
        let body = client.build_request(&request);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_build_request_overrides() {
        let client = test_client();
        let mut request = CompletionRequest::new("s").with_temperature(0.0);
        request.model = Some("openai/gpt-4o-mini".to_string());
        request.max_tokens = Some(64);

        let body = client.build_request(&request);
        assert_eq!(body["model"], "openai/gpt-4o-mini");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_parse_response_text() {
        let client = test_client();
        let api_response = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "SELECT 1" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 3 }
        });

        let response = client.parse_response(api_response).unwrap();
        assert_eq!(response.content, "SELECT 1");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage, Usage::new(10, 3));
        assert_eq!(client.total_usage(), Usage::new(10, 3));
    }

    #[test]
    fn test_parse_response_accumulates_usage() {
        let client = test_client();
        for _ in 0..2 {
            let api_response = json!({
                "choices": [{ "message": { "content": "ok" }, "finish_reason": "length" }],
                "usage": { "prompt_tokens": 5, "completion_tokens": 5 }
            });
            let response = client.parse_response(api_response).unwrap();
            assert_eq!(response.stop_reason, StopReason::MaxTokens);
        }
        assert_eq!(client.total_usage().total(), 20);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let client = test_client();
        let err = client.parse_response(json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = test_client();
        let debug = format!("{:?}", client);
        assert!(debug.contains("OpenRouterClient"));
        assert!(!debug.contains("test-key"));
    }
}
