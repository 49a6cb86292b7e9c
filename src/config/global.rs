//! Global configuration.
//!
//! Loaded from ./.ragsql.yml or ~/.config/ragsql/ragsql.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::index::embedder::DEFAULT_HASHING_DIMENSIONS;
use crate::ingest::DEFAULT_CHUNK_CHARS;
use crate::llm::openrouter::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::router::RoutingPolicy;
use crate::session::DEFAULT_MAX_HISTORY;
use crate::synth::DEFAULT_PASSAGES_IN_TEXT;
use crate::tools::{DEFAULT_MAX_ROWS, DEFAULT_TOP_K, MAX_TOP_K};

/// Global configuration for ragsql.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// LLM provider settings.
    pub llm: LlmConfig,

    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,

    /// Where the data lives.
    pub sources: SourcesConfig,

    /// Document retrieval settings.
    pub retrieval: RetrievalConfig,

    /// Routing and dispatch settings.
    pub router: RouterConfig,

    /// Conversation settings.
    pub session: SessionConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .ragsql.yml in current directory
    /// 3. ~/.config/ragsql/ragsql.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".ragsql.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .ragsql.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .ragsql.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ragsql").join("ragsql.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.llm.timeout_ms == 0 {
            eyre::bail!("llm.timeout-ms must be > 0");
        }
        if self.llm.max_tokens == 0 {
            eyre::bail!("llm.max-tokens must be > 0");
        }
        if self.router.tool_timeout_ms == 0 {
            eyre::bail!("router.tool-timeout-ms must be > 0");
        }
        if self.router.max_rows == 0 {
            eyre::bail!("router.max-rows must be > 0");
        }
        if !(1..=MAX_TOP_K).contains(&self.retrieval.top_k) {
            eyre::bail!("retrieval.top-k must be between 1 and {}", MAX_TOP_K);
        }
        if self.retrieval.chunk_chars == 0 {
            eyre::bail!("retrieval.chunk-chars must be > 0");
        }
        if self.retrieval.passages_in_answer == 0 {
            eyre::bail!("retrieval.passages-in-answer must be > 0");
        }
        if self.embedding.dimensions == 0 {
            eyre::bail!("embedding.dimensions must be > 0");
        }
        if self.embedding.provider == EmbeddingProvider::Http && self.embedding.base_url.is_empty() {
            eyre::bail!("embedding.base-url is required for the http provider");
        }
        Ok(())
    }
}

/// LLM provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model id (provider/model format).
    pub model: String,

    /// OpenAI-compatible API base URL.
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Timeout per LLM call in milliseconds.
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_ms: 60_000,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProvider {
    /// Offline feature hashing
    #[default]
    Hashing,
    /// OpenAI-compatible /embeddings endpoint
    Http,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    pub model: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: "text-embedding-3-small".to_string(),
            base_url: String::new(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: DEFAULT_HASHING_DIMENSIONS,
        }
    }
}

/// Data sources.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// SQLite database file.
    pub database: Option<PathBuf>,

    /// Tables exposed to the SQL tool; empty means all.
    pub tables: Vec<String>,

    /// Directory of .txt/.md documents.
    pub documents: Option<PathBuf>,

    /// TOML tool catalog; the built-in tools are used when unset.
    #[serde(rename = "tools-catalog")]
    pub tools_catalog: Option<PathBuf>,
}

/// Document retrieval settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages returned per question.
    #[serde(rename = "top-k")]
    pub top_k: usize,

    /// Target chunk size in characters.
    #[serde(rename = "chunk-chars")]
    pub chunk_chars: usize,

    /// Passages quoted in the answer text; every retrieved passage is still cited.
    #[serde(rename = "passages-in-answer")]
    pub passages_in_answer: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            passages_in_answer: DEFAULT_PASSAGES_IN_TEXT,
        }
    }
}

/// Routing and dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Per-tool timeout in milliseconds.
    #[serde(rename = "tool-timeout-ms")]
    pub tool_timeout_ms: u64,

    /// Row cap for SQL results.
    #[serde(rename = "max-rows")]
    pub max_rows: usize,

    /// Ask the LLM when no routing signal is found.
    #[serde(rename = "llm-fallback")]
    pub llm_fallback: bool,

    /// Rewrite template answers with the LLM.
    #[serde(rename = "llm-prose")]
    pub llm_prose: bool,

    /// Initial delay before retrying a rate-limited or timed-out LLM call.
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Classification term lists.
    pub policy: RoutingPolicy,
}

impl RouterConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tool_timeout_ms: 5000,
            max_rows: DEFAULT_MAX_ROWS,
            llm_fallback: false,
            llm_prose: false,
            retry_backoff_ms: 500,
            policy: RoutingPolicy::default(),
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prior turns kept as context.
    #[serde(rename = "max-history")]
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.router.tool_timeout_ms, 5000);
        assert_eq!(config.router.max_rows, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.passages_in_answer, 3);
        assert_eq!(config.session.max_history, 20);
        assert_eq!(config.llm.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.llm.api_key_env, "OPENROUTER_API_KEY");
        assert!(!config.router.llm_fallback);
    }

    #[test]
    fn test_config_validation() {
        let config = GlobalConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let zero_timeout = GlobalConfig {
            router: RouterConfig {
                tool_timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());

        let wide_top_k = GlobalConfig {
            retrieval: RetrievalConfig {
                top_k: 51,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(wide_top_k.validate().is_err());

        let no_passages = GlobalConfig {
            retrieval: RetrievalConfig {
                passages_in_answer: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(no_passages.validate().is_err());

        let http_without_url = GlobalConfig {
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::Http,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(http_without_url.validate().is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
llm:
  model: openai/gpt-4o-mini
  timeout-ms: 30000
sources:
  database: people.db
  tables: [people]
  documents: docs
router:
  tool-timeout-ms: 2000
  llm-fallback: true
  policy:
    field-terms: [locker number]
embedding:
  provider: http
  base-url: http://localhost:11434/v1
"#;
        let config: GlobalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
        assert_eq!(config.llm.timeout(), Duration::from_secs(30));
        assert_eq!(config.sources.database, Some(PathBuf::from("people.db")));
        assert_eq!(config.sources.tables, vec!["people"]);
        assert_eq!(config.router.tool_timeout(), Duration::from_secs(2));
        assert!(config.router.llm_fallback);
        assert_eq!(config.router.policy.field_terms, vec!["locker number"]);
        assert!(!config.router.policy.policy_terms.is_empty());
        assert_eq!(config.embedding.provider, EmbeddingProvider::Http);
        // Other fields should have defaults
        assert_eq!(config.llm.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragsql.yml");
        fs::write(&path, "retrieval:\n  top-k: 3\n  passages-in-answer: 1\n").unwrap();
        let config = GlobalConfig::load(Some(&path)).unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.passages_in_answer, 1);

        let missing = dir.path().join("missing.yml");
        assert!(GlobalConfig::load(Some(&missing)).is_err());
    }
}
