//! Structured query tool: question + schema -> rows
//!
//! Generation failures and backend syntax errors get one more attempt with the same
//! input. Every statement passes the read-only guard before the backend sees it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::question::Question;

use super::backend::{BackendError, SchemaSummary, StructuredBackend};
use super::descriptor::SQL_TOOL_ID;
use super::error::ToolError;
use super::generator::SqlGenerator;
use super::result::{TabularResult, ToolInput, ToolResult};
use super::sql_guard::check_read_only;
use super::QueryTool;

/// Default cap on returned rows
pub const DEFAULT_MAX_ROWS: usize = 50;

const MAX_ATTEMPTS: u32 = 2;

pub struct StructuredQueryTool {
    id: String,
    backend: Arc<dyn StructuredBackend>,
    generator: Arc<dyn SqlGenerator>,
    schema: SchemaSummary,
    max_rows: usize,
}

impl StructuredQueryTool {
    pub fn new(
        backend: Arc<dyn StructuredBackend>,
        generator: Arc<dyn SqlGenerator>,
        schema: SchemaSummary,
    ) -> Self {
        Self {
            id: SQL_TOOL_ID.to_string(),
            backend,
            generator,
            schema,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Build the tool, reading the schema from the backend once
    pub async fn connect(
        backend: Arc<dyn StructuredBackend>,
        generator: Arc<dyn SqlGenerator>,
    ) -> Result<Self, ToolError> {
        let schema = backend
            .schema()
            .await
            .map_err(|e| ToolError::Backend(e.to_string()))?;
        Ok(Self::new(backend, generator, schema))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn schema(&self) -> &SchemaSummary {
        &self.schema
    }

    /// Answer `question` from the tables in `schema`
    pub async fn query(&self, question: &str, schema: &SchemaSummary) -> Result<TabularResult, ToolError> {
        if question.trim().is_empty() {
            return Err(ToolError::InvalidParameter("question is empty".to_string()));
        }
        if !schema.has_columns() {
            return Err(ToolError::InvalidParameter(
                "schema has no table with columns".to_string(),
            ));
        }

        let description = schema.describe();
        let mut last_problem = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let sql = match self.generator.generate(question, &description).await {
                Ok(sql) => sql,
                Err(ToolError::GenerationError(msg)) => {
                    log::warn!("{}: generation attempt {} failed: {}", self.id, attempt, msg);
                    last_problem = msg;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let sql = sql.trim().to_string();
            if sql.is_empty() {
                log::warn!("{}: generation attempt {} produced no statement", self.id, attempt);
                last_problem = "no statement was generated".to_string();
                continue;
            }

            check_read_only(&sql)?;

            match self.backend.execute(&sql, self.max_rows).await {
                Ok(rows) => {
                    log::debug!("{}: {} row(s) from `{}`", self.id, rows.rows.len(), sql);
                    return Ok(TabularResult {
                        columns: rows.columns,
                        rows: rows.rows,
                        source: self.backend.locator(),
                        sql,
                        truncated: rows.truncated,
                    });
                }
                Err(BackendError::Syntax(msg)) => {
                    log::warn!("{}: attempt {} syntax error: {}", self.id, attempt, msg);
                    last_problem = msg;
                }
                Err(BackendError::Execution(msg)) => return Err(ToolError::ExecutionError(msg)),
                Err(BackendError::Unavailable(msg)) => return Err(ToolError::Backend(msg)),
            }
        }

        Err(ToolError::GenerationError(last_problem))
    }
}

#[async_trait]
impl QueryTool for StructuredQueryTool {
    fn id(&self) -> &str {
        &self.id
    }

    fn prepare(&self, question: &Question) -> ToolInput {
        ToolInput::Structured {
            question: question.render_with_context(),
            schema: self.schema.clone(),
        }
    }

    async fn run(&self, input: &ToolInput) -> Result<ToolResult, ToolError> {
        match input {
            ToolInput::Structured { question, schema } => {
                self.query(question, schema).await.map(ToolResult::Tabular)
            }
            other => Err(ToolError::InvalidParameter(format!(
                "{} expects structured input, got {:?}",
                self.id, other
            ))),
        }
    }
}
