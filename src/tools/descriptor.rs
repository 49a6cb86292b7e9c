//! Tool descriptors and capability tags
//!
//! A descriptor is static metadata: the router reads it to decide which tools may
//! serve a question, the synthesizer reads it to order and caveat results.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Id of the built-in structured (SQL) tool
pub const SQL_TOOL_ID: &str = "sql_tool";

/// Id of the built-in document retrieval tool
pub const DOCUMENT_TOOL_ID: &str = "document_tool";

/// What kind of source a tool answers from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Tabular data queried with SQL
    Structured,
    /// Free text searched by similarity
    Unstructured,
}

impl Capability {
    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "structured" | "sql" => Some(Self::Structured),
            "unstructured" | "documents" | "docs" => Some(Self::Unstructured),
            _ => None,
        }
    }

    /// Human-facing name used in caveats and apologies
    pub fn label(&self) -> &'static str {
        match self {
            Self::Structured => "structured data lookup",
            Self::Unstructured => "document search",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Unstructured => write!(f, "unstructured"),
        }
    }
}

/// Static metadata for one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub description: String,
    pub capabilities: Vec<Capability>,
    /// JSON schema for the tool's input
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Create a descriptor with an empty object schema
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            capabilities: Vec::new(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// First declared capability; descriptors without one are treated as unstructured
    pub fn primary_capability(&self) -> Capability {
        self.capabilities
            .first()
            .copied()
            .unwrap_or(Capability::Unstructured)
    }
}

/// Built-in descriptor for the SQL tool
pub fn sql_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        SQL_TOOL_ID,
        "Query structured person data (names, emails, phone numbers, birthdays, addresses) \
         from the spreadsheet-derived database. Use for finding specific people by name, \
         filtering by criteria, and counts or other statistics.",
    )
    .with_capability(Capability::Structured)
    .with_schema(serde_json::json!({
        "type": "object",
        "properties": {
            "question": { "type": "string", "description": "Natural-language question" },
            "schema": { "type": "string", "description": "Tables and columns available" }
        },
        "required": ["question", "schema"]
    }))
}

/// Built-in descriptor for the document tool
pub fn document_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        DOCUMENT_TOOL_ID,
        "Search indexed documents for policies, procedures, guidelines, terms and \
         conditions, privacy policies, institutional information and other qualitative \
         content. Not for personal data about specific people.",
    )
    .with_capability(Capability::Unstructured)
    .with_schema(serde_json::json!({
        "type": "object",
        "properties": {
            "question": { "type": "string", "description": "Natural-language question" },
            "top_k": { "type": "integer", "description": "Passages to return (1-50, default 5)" }
        },
        "required": ["question"]
    }))
}
