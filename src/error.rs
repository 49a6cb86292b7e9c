//! Error types for ragsql
//!
//! Centralized handling for errors that abort a query. Tool-local failures live in
//! `tools::ToolError` and never cross the router boundary as `RagsqlError` except
//! when every selected tool failed.

use thiserror::Error;

use crate::tools::Capability;

/// One tool's unrecoverable failure, kept for the `AllToolsFailed` report
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub tool_id: String,
    pub capability: Capability,
    pub reason: String,
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.tool_id, self.capability, self.reason)
    }
}

fn join_failures(failures: &[ToolFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// All errors that end a query without an answer
#[derive(Debug, Error)]
pub enum RagsqlError {
    /// Tool id not present in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool id registered twice
    #[error("Duplicate tool id: {0}")]
    DuplicateToolId(String),

    /// Every selected tool failed with an unrecoverable error
    #[error("All tools failed: {}", join_failures(.0))]
    AllToolsFailed(Vec<ToolFailure>),

    /// The caller cancelled the query (or a newer one superseded it)
    #[error("Query cancelled")]
    Cancelled,

    /// Question text rejected before routing
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// Invalid query state transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration problem detected at startup
    #[error("Config error: {0}")]
    Config(String),

    /// Backing store could not be opened or read
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagsqlError {
    /// Capabilities that were unavailable when this error ended the query
    pub fn unavailable_capabilities(&self) -> Vec<Capability> {
        match self {
            RagsqlError::AllToolsFailed(failures) => {
                let mut caps = Vec::new();
                for failure in failures {
                    if !caps.contains(&failure.capability) {
                        caps.push(failure.capability);
                    }
                }
                caps
            }
            _ => Vec::new(),
        }
    }
}

/// Result type alias for ragsql operations
pub type Result<T> = std::result::Result<T, RagsqlError>;
