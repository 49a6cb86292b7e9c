//! Wire configuration into a ready router
//!
//! config -> registry -> LLM client -> tools -> router. Each tool is bound to the
//! first registry entry with its capability. The structured tool needs a database
//! and an LLM; the document tool gets an empty index when no documents are configured.

use std::sync::Arc;

use eyre::{Context, Result};

use crate::config::{EmbeddingProvider, GlobalConfig};
use crate::index::{Embedder, HashingEmbedder, HttpEmbedder, InMemoryIndex};
use crate::ingest;
use crate::llm::{LlmClient, OpenRouterClient, OpenRouterConfig, RetryPolicy, Usage};
use crate::router::{Classifier, LlmRouteClassifier, Router, RouterBuilder};
use crate::session::Session;
use crate::synth::{LlmProseWriter, Synthesizer};
use crate::tools::{
    Capability, LlmSqlGenerator, SqliteBackend, StructuredBackend, StructuredQueryTool, ToolRegistry,
    UnstructuredRetrievalTool,
};

/// Everything the CLI needs
pub struct App {
    pub config: GlobalConfig,
    pub router: Arc<Router>,
    pub database: Option<Arc<SqliteBackend>>,
    pub llm: Option<Arc<OpenRouterClient>>,
}

impl App {
    pub fn session(&self) -> Session {
        Session::new(self.router.clone()).with_max_history(self.config.session.max_history)
    }

    /// Tokens spent so far; None without an LLM
    pub fn llm_usage(&self) -> Option<Usage> {
        self.llm.as_ref().map(|client| client.total_usage())
    }
}

/// Id of the first registered tool with `capability`
fn tool_id_for(registry: &ToolRegistry, capability: Capability) -> Option<String> {
    registry.with_capability(capability).first().map(|d| d.id.clone())
}

pub fn load_registry(config: &GlobalConfig) -> Result<Arc<ToolRegistry>> {
    let registry = match &config.sources.tools_catalog {
        Some(path) => ToolRegistry::from_file(path)
            .wrap_err_with(|| format!("Failed to load tool catalog {}", path.display()))?,
        None => ToolRegistry::builtin(),
    };
    log::info!("registry has {} tools", registry.len());
    Ok(Arc::new(registry))
}

/// LLM client from config; None when the API key is not set
pub fn llm_client(config: &GlobalConfig) -> Result<Option<Arc<OpenRouterClient>>> {
    let llm_config = OpenRouterConfig {
        base_url: config.llm.base_url.clone(),
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        timeout: config.llm.timeout(),
    };
    match OpenRouterClient::from_env(&config.llm.api_key_env, llm_config) {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(crate::llm::LlmError::MissingApiKey { env_var }) => {
            log::warn!("{} is not set; LLM features are disabled", env_var);
            Ok(None)
        }
        Err(e) => Err(e).wrap_err("Failed to create LLM client"),
    }
}

pub fn build_embedder(config: &GlobalConfig) -> Arc<dyn Embedder> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(embedding.dimensions)),
        EmbeddingProvider::Http => {
            let mut http = HttpEmbedder::new(&embedding.base_url, &embedding.model, embedding.dimensions);
            match std::env::var(&embedding.api_key_env) {
                Ok(key) => http = http.with_api_key(key),
                Err(_) => log::debug!("{} not set; calling embeddings without a key", embedding.api_key_env),
            }
            Arc::new(http)
        }
    }
}

pub fn open_database(config: &GlobalConfig) -> Result<Option<Arc<SqliteBackend>>> {
    match &config.sources.database {
        Some(path) => {
            let backend = SqliteBackend::open(path)
                .wrap_err_with(|| format!("Failed to open database {}", path.display()))?
                .with_tables(config.sources.tables.clone());
            Ok(Some(Arc::new(backend)))
        }
        None => Ok(None),
    }
}

async fn build_index(config: &GlobalConfig, embedder: &dyn Embedder) -> Result<InMemoryIndex> {
    match &config.sources.documents {
        Some(dir) => {
            let chunks = ingest::load_directory(dir, config.retrieval.chunk_chars)
                .wrap_err_with(|| format!("Failed to load documents from {}", dir.display()))?;
            ingest::build_index(&chunks, embedder)
                .await
                .wrap_err("Failed to index documents")
        }
        None => {
            log::warn!("no document directory configured; document search has nothing to search");
            Ok(InMemoryIndex::new(embedder.dimensions()))
        }
    }
}

/// Build the router and its collaborators
pub async fn build(config: GlobalConfig) -> Result<App> {
    let registry = load_registry(&config)?;
    let llm = llm_client(&config)?;
    let client: Option<Arc<dyn LlmClient>> = llm.clone().map(|c| c as Arc<dyn LlmClient>);
    let database = open_database(&config)?;
    let retry = RetryPolicy::default().with_backoff(config.router.retry_backoff());

    let mut builder = RouterBuilder::new(registry.clone())
        .with_classifier(Classifier::new(&config.router.policy).wrap_err("Invalid routing policy")?)
        .with_tool_timeout(config.router.tool_timeout());

    match (&database, &client, tool_id_for(&registry, Capability::Structured)) {
        (Some(db), Some(client), Some(id)) => {
            let backend: Arc<dyn StructuredBackend> = db.clone();
            let generator = Arc::new(LlmSqlGenerator::new(client.clone()).with_retry_policy(retry));
            let tool = StructuredQueryTool::connect(backend, generator)
                .await
                .wrap_err("Failed to read database schema")?
                .with_id(id)
                .with_max_rows(config.router.max_rows);
            builder = builder.with_tool(Arc::new(tool));
        }
        (Some(_), None, _) => log::warn!("database configured but no LLM; structured lookups are disabled"),
        (Some(_), Some(_), None) => log::warn!("no structured tool in the registry; the database is unused"),
        _ => {}
    }

    match tool_id_for(&registry, Capability::Unstructured) {
        Some(id) => {
            let embedder = build_embedder(&config);
            let index = build_index(&config, embedder.as_ref()).await?;
            let documents = UnstructuredRetrievalTool::new(embedder, Arc::new(index))
                .with_id(id)
                .with_top_k(config.retrieval.top_k);
            builder = builder.with_tool(Arc::new(documents));
        }
        None => log::warn!("no unstructured tool in the registry; documents are not indexed"),
    }

    let mut synthesizer =
        Synthesizer::new(registry.clone()).with_passages_in_text(config.retrieval.passages_in_answer);
    if let Some(client) = &client {
        if config.router.llm_fallback {
            builder = builder.with_fallback(LlmRouteClassifier::new(client.clone()).with_retry_policy(retry));
        }
        if config.router.llm_prose {
            let prose = LlmProseWriter::new(client.clone()).with_retry_policy(retry);
            synthesizer = synthesizer.with_prose_writer(Arc::new(prose));
        }
    }
    builder = builder.with_synthesizer(synthesizer);

    let router = builder.build().wrap_err("Failed to build router")?;
    Ok(App {
        config,
        router: Arc::new(router),
        database,
        llm,
    })
}
