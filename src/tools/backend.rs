//! Structured data backend seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors reported by a structured backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The statement could not be parsed
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// The statement parsed but failed against the data
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The store could not be reached or opened
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            primary_key: false,
        }
    }
}

/// A table and its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// Tables visible to the structured tool
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub tables: Vec<TableSchema>,
}

impl SchemaSummary {
    /// At least one table with at least one column
    pub fn has_columns(&self) -> bool {
        self.tables.iter().any(|t| !t.columns.is_empty())
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Prompt-ready description of tables, columns and types
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            out.push_str(&format!("Table {}:\n", table.name));
            for column in &table.columns {
                let mut flags = Vec::new();
                if column.primary_key {
                    flags.push("primary key");
                }
                if column.not_null {
                    flags.push("not null");
                }
                let data_type = if column.data_type.is_empty() {
                    "ANY"
                } else {
                    column.data_type.as_str()
                };
                if flags.is_empty() {
                    out.push_str(&format!("  - {} ({})\n", column.name, data_type));
                } else {
                    out.push_str(&format!("  - {} ({}, {})\n", column.name, data_type, flags.join(", ")));
                }
            }
        }
        out
    }
}

/// Rows returned by a backend query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub truncated: bool,
}

/// Read-only access to tabular data
#[async_trait]
pub trait StructuredBackend: Send + Sync {
    /// Tables and columns available for querying
    async fn schema(&self) -> Result<SchemaSummary, BackendError>;

    /// Run one read-only statement, returning at most `max_rows` rows
    async fn execute(&self, sql: &str, max_rows: usize) -> Result<QueryRows, BackendError>;

    /// Locator cited for rows from this backend
    fn locator(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> SchemaSummary {
        let mut id = ColumnSchema::new("id", "INTEGER");
        id.primary_key = true;
        let mut name = ColumnSchema::new("name", "TEXT");
        name.not_null = true;
        SchemaSummary {
            tables: vec![TableSchema {
                name: "people".to_string(),
                columns: vec![id, name, ColumnSchema::new("email", "")],
            }],
        }
    }

    #[test]
    fn test_describe() {
        let text = people().describe();
        assert_eq!(
            text,
            "Table people:\n  - id (INTEGER, primary key)\n  - name (TEXT, not null)\n  - email (ANY)\n"
        );
    }

    #[test]
    fn test_has_columns() {
        assert!(people().has_columns());
        assert!(!SchemaSummary::default().has_columns());
        let empty_table = SchemaSummary {
            tables: vec![TableSchema {
                name: "t".to_string(),
                columns: vec![],
            }],
        };
        assert!(!empty_table.has_columns());
    }

    #[test]
    fn test_table_lookup_ignores_case() {
        assert!(people().table("PEOPLE").is_some());
        assert!(people().table("orders").is_none());
    }

    #[test]
    fn test_backend_error_display() {
        assert_eq!(
            BackendError::Execution("no such column: foo".to_string()).to_string(),
            "Execution failed: no such column: foo"
        );
    }
}
