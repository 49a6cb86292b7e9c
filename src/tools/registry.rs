//! Tool registry: declaration-ordered descriptors, optionally loaded from TOML
//!
//! The registry is built once at startup and then shared read-only behind `Arc`.
//! Declaration order matters: the synthesizer orders results by it.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{RagsqlError, Result};

use super::descriptor::{Capability, ToolDescriptor, document_tool, sql_tool};

/// TOML representation of a tool parameter
#[derive(Debug, Deserialize)]
struct TomlParam {
    #[serde(rename = "type")]
    param_type: String,
    description: Option<String>,
}

/// TOML representation of a tool descriptor
#[derive(Debug, Deserialize)]
struct TomlTool {
    id: String,
    description: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    params: BTreeMap<String, TomlParam>,
    #[serde(default)]
    required: Vec<String>,
}

/// TOML file structure
#[derive(Debug, Deserialize)]
struct TomlCatalog {
    #[serde(rename = "tool", default)]
    tools: Vec<TomlTool>,
}

/// Ordered set of tool descriptors keyed by id
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the two built-in tools, SQL first
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in [sql_tool(), document_tool()] {
            // ids are distinct constants
            let _ = registry.register(descriptor);
        }
        registry
    }

    /// Load a registry from a TOML catalog file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RagsqlError::Config(format!("Failed to read tool catalog: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Load a registry from a TOML catalog string
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: TomlCatalog = toml::from_str(content)
            .map_err(|e| RagsqlError::Config(format!("Failed to parse tool catalog: {}", e)))?;

        let mut registry = Self::new();
        for toml_tool in catalog.tools {
            registry.register(Self::convert_toml_tool(toml_tool)?)?;
        }
        Ok(registry)
    }

    fn convert_toml_tool(toml_tool: TomlTool) -> Result<ToolDescriptor> {
        let mut properties = serde_json::Map::new();
        for (name, param) in toml_tool.params {
            let mut prop = serde_json::Map::new();
            prop.insert("type".to_string(), Value::String(param.param_type));
            if let Some(desc) = param.description {
                prop.insert("description".to_string(), Value::String(desc));
            }
            properties.insert(name, Value::Object(prop));
        }

        let schema = serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": toml_tool.required
        });

        let mut descriptor = ToolDescriptor::new(toml_tool.id, toml_tool.description).with_schema(schema);
        for raw in &toml_tool.capabilities {
            let capability = Capability::from_str(raw).ok_or_else(|| {
                RagsqlError::Config(format!(
                    "Invalid capability '{}' for tool '{}'",
                    raw, descriptor.id
                ))
            })?;
            descriptor = descriptor.with_capability(capability);
        }
        if descriptor.capabilities.is_empty() {
            return Err(RagsqlError::Config(format!(
                "Tool '{}' declares no capabilities",
                descriptor.id
            )));
        }

        Ok(descriptor)
    }

    /// Add a descriptor; ids must be unique
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if self.index.contains_key(&descriptor.id) {
            return Err(RagsqlError::DuplicateToolId(descriptor.id));
        }
        self.index.insert(descriptor.id.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Descriptors in declaration order
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, id: &str) -> Result<&ToolDescriptor> {
        self.index
            .get(id)
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| RagsqlError::UnknownTool(id.to_string()))
    }

    /// Declaration index of a tool
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Tools carrying `capability`, in declaration order
    pub fn with_capability(&self, capability: Capability) -> Vec<&ToolDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.has_capability(capability))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::descriptor::{DOCUMENT_TOOL_ID, SQL_TOOL_ID};

    const SAMPLE_TOML: &str = r#"
[[tool]]
id = "sql_tool"
description = "Query the people table"
capabilities = ["structured"]
required = ["question", "schema"]

[tool.params.question]
type = "string"
description = "Natural-language question"

[tool.params.schema]
type = "string"

[[tool]]
id = "document_tool"
description = "Search policy documents"
capabilities = ["unstructured"]

[tool.params.question]
type = "string"

[[tool]]
id = "hybrid_tool"
description = "Both"
capabilities = ["structured", "unstructured"]
"#;

    #[test]
    fn test_registry_new_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_builtin_order() {
        let registry = ToolRegistry::builtin();
        let ids: Vec<_> = registry.list().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec![SQL_TOOL_ID, DOCUMENT_TOOL_ID]);
        assert_eq!(registry.position(SQL_TOOL_ID), Some(0));
        assert_eq!(registry.position(DOCUMENT_TOOL_ID), Some(1));
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = ToolRegistry::builtin();
        let err = registry.register(sql_tool()).unwrap_err();
        assert!(matches!(err, RagsqlError::DuplicateToolId(id) if id == SQL_TOOL_ID));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_unknown() {
        let registry = ToolRegistry::builtin();
        let err = registry.get("web_tool").unwrap_err();
        assert!(matches!(err, RagsqlError::UnknownTool(id) if id == "web_tool"));
        assert!(registry.position("web_tool").is_none());
    }

    #[test]
    fn test_from_toml_preserves_declaration_order() {
        let registry = ToolRegistry::from_toml(SAMPLE_TOML).unwrap();
        let ids: Vec<_> = registry.list().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["sql_tool", "document_tool", "hybrid_tool"]);
    }

    #[test]
    fn test_from_toml_schema() {
        let registry = ToolRegistry::from_toml(SAMPLE_TOML).unwrap();
        let sql = registry.get("sql_tool").unwrap();
        assert_eq!(sql.input_schema["properties"]["question"]["type"], "string");
        assert_eq!(
            sql.input_schema["properties"]["question"]["description"],
            "Natural-language question"
        );
        assert_eq!(sql.input_schema["required"][1], "schema");
    }

    #[test]
    fn test_with_capability() {
        let registry = ToolRegistry::from_toml(SAMPLE_TOML).unwrap();
        let structured: Vec<_> = registry
            .with_capability(Capability::Structured)
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(structured, vec!["sql_tool", "hybrid_tool"]);
        assert_eq!(registry.with_capability(Capability::Unstructured).len(), 2);
    }

    #[test]
    fn test_from_toml_duplicate_id() {
        let toml = r#"
[[tool]]
id = "a"
description = "first"
capabilities = ["structured"]

[[tool]]
id = "a"
description = "second"
capabilities = ["unstructured"]
"#;
        let err = ToolRegistry::from_toml(toml).unwrap_err();
        assert!(matches!(err, RagsqlError::DuplicateToolId(_)));
    }

    #[test]
    fn test_from_toml_invalid_capability() {
        let toml = r#"
[[tool]]
id = "bad"
description = "Bad tool"
capabilities = ["web"]
"#;
        let err = ToolRegistry::from_toml(toml).unwrap_err();
        assert!(matches!(err, RagsqlError::Config(_)));
    }

    #[test]
    fn test_from_toml_missing_capabilities() {
        let toml = r#"
[[tool]]
id = "bare"
description = "No tags"
"#;
        assert!(ToolRegistry::from_toml(toml).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(ToolRegistry::from_toml("invalid { toml }").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.toml");
        std::fs::write(&path, SAMPLE_TOML).unwrap();
        let registry = ToolRegistry::from_file(&path).unwrap();
        assert_eq!(registry.len(), 3);

        let missing = ToolRegistry::from_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(RagsqlError::Config(_))));
    }
}
