//! Tool System - descriptors, registry, and the two query tools
//!
//! The structured tool turns a question into read-only SQL; the unstructured tool
//! retrieves ranked passages. Both sit behind `QueryTool` so the router can dispatch
//! them uniformly.

mod backend;
mod descriptor;
mod error;
mod generator;
mod registry;
mod result;
pub mod sql_guard;
mod sqlite;
mod structured;
mod unstructured;

use async_trait::async_trait;

use crate::question::Question;

pub use backend::{BackendError, ColumnSchema, QueryRows, SchemaSummary, StructuredBackend, TableSchema};
pub use descriptor::{Capability, DOCUMENT_TOOL_ID, SQL_TOOL_ID, ToolDescriptor, document_tool, sql_tool};
pub use error::{Disposition, ToolError};
pub use generator::{LlmSqlGenerator, SqlGenerator, strip_code_fences};
pub use registry::ToolRegistry;
pub use result::{PassageResult, TabularResult, ToolInput, ToolInvocation, ToolResult};
pub use sqlite::{SqliteBackend, TableStats};
pub use structured::{DEFAULT_MAX_ROWS, StructuredQueryTool};
pub use unstructured::{DEFAULT_TOP_K, MAX_TOP_K, UnstructuredRetrievalTool};

/// A tool the router can invoke
#[async_trait]
pub trait QueryTool: Send + Sync {
    /// Registry id this tool is bound to
    fn id(&self) -> &str;

    /// Resolve the tool's input for a question
    fn prepare(&self, question: &Question) -> ToolInput;

    async fn run(&self, input: &ToolInput) -> Result<ToolResult, ToolError>;
}
