//! Tool-local errors
//!
//! These never end a query on their own. The router records each one as a
//! `ToolInvocation` outcome and the synthesizer turns it into a caveat.

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// Store error messages we can explain to the user
const RECOGNIZED_EXECUTION_CAUSES: &[&str] = &[
    "no such column",
    "no such table",
    "ambiguous column",
    "no such function",
];

/// Whether a tool failure still lets us answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Explained to the user as a caveat
    Reportable,
    /// The tool's capability is unavailable for this query
    Unrecoverable,
}

/// Errors raised by a single tool invocation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Could not generate a usable query: {0}")]
    GenerationError(String),

    #[error("Query failed: {0}")]
    ExecutionError(String),

    #[error("Unsafe query rejected: {reason}")]
    UnsafeQueryRejected { reason: String },

    #[error("No documents indexed")]
    NoDocumentsIndexed,

    #[error("Tool timed out after {0:?}")]
    ToolTimeout(Duration),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl ToolError {
    pub fn disposition(&self) -> Disposition {
        match self {
            ToolError::NoDocumentsIndexed | ToolError::ToolTimeout(_) | ToolError::GenerationError(_) => {
                Disposition::Reportable
            }
            ToolError::ExecutionError(_) if self.recognized_cause().is_some() => Disposition::Reportable,
            ToolError::Llm(e) if e.is_retryable() => Disposition::Reportable,
            _ => Disposition::Unrecoverable,
        }
    }

    pub fn is_reportable(&self) -> bool {
        self.disposition() == Disposition::Reportable
    }

    /// Matched cause of an execution failure, e.g. "no such column"
    pub fn recognized_cause(&self) -> Option<&'static str> {
        match self {
            ToolError::ExecutionError(msg) => {
                let lower = msg.to_lowercase();
                RECOGNIZED_EXECUTION_CAUSES
                    .iter()
                    .find(|cause| lower.contains(**cause))
                    .copied()
            }
            _ => None,
        }
    }

    /// Short machine-readable kind for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidParameter(_) => "invalid_parameter",
            ToolError::GenerationError(_) => "generation_error",
            ToolError::ExecutionError(_) => "execution_error",
            ToolError::UnsafeQueryRejected { .. } => "unsafe_query_rejected",
            ToolError::NoDocumentsIndexed => "no_documents_indexed",
            ToolError::ToolTimeout(_) => "tool_timeout",
            ToolError::Llm(_) => "llm",
            ToolError::Backend(_) => "backend",
        }
    }
}
