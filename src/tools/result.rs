//! Tool inputs, results and invocation records

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::Passage;

use super::backend::SchemaSummary;
use super::descriptor::Capability;
use super::error::ToolError;

/// Input resolved for one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ToolInput {
    Structured { question: String, schema: SchemaSummary },
    Unstructured { question: String, top_k: usize },
}

impl ToolInput {
    pub fn question(&self) -> &str {
        match self {
            ToolInput::Structured { question, .. } | ToolInput::Unstructured { question, .. } => question,
        }
    }

    /// Capability this input exercises
    pub fn capability(&self) -> Capability {
        match self {
            ToolInput::Structured { .. } => Capability::Structured,
            ToolInput::Unstructured { .. } => Capability::Unstructured,
        }
    }
}

/// Rows returned by the structured tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Where the rows came from, e.g. `sqlite:people.db`
    pub source: String,
    /// The statement that produced the rows
    pub sql: String,
    /// More rows existed than were returned
    #[serde(default)]
    pub truncated: bool,
}

impl TabularResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Ranked passages returned by the unstructured tool
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PassageResult {
    pub passages: Vec<Passage>,
}

/// Output of a successful tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ToolResult {
    Tabular(TabularResult),
    Passages(PassageResult),
}

impl ToolResult {
    /// Source locators in result order, duplicates included
    pub fn locators(&self) -> Vec<String> {
        match self {
            ToolResult::Tabular(t) => vec![t.source.clone()],
            ToolResult::Passages(p) => p.passages.iter().map(|p| p.locator.clone()).collect(),
        }
    }
}

/// One tool call made for a query
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_id: String,
    pub input: ToolInput,
    pub outcome: Result<ToolResult, ToolError>,
    pub latency: Duration,
}

impl ToolInvocation {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.outcome.as_ref().err()
    }
}
