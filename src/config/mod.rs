//! Configuration system for ragsql.
//!
//! A single YAML file (./.ragsql.yml or ~/.config/ragsql/ragsql.yml) with sections
//! for the LLM, embeddings, data sources, retrieval, routing and the session.

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{
    EmbeddingConfig, EmbeddingProvider, GlobalConfig, LlmConfig, RetrievalConfig, RouterConfig, SessionConfig,
    SourcesConfig,
};

mod global;

/// Load and validate configuration from the standard search paths.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. .ragsql.yml in current directory (project config)
/// 3. ~/.config/ragsql/ragsql.yml (user config)
/// 4. Default values
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    let config = GlobalConfig::load(explicit_path)?;
    config.validate()?;
    Ok(config)
}
