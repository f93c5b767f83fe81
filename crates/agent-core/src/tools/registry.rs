use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

use crate::tools::{FunctionSchema, ToolError, ToolResult, ToolSchema};

/// A named, schema-typed callable capability the model may request.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError>;

    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

pub type SharedTool = Arc<dyn Tool>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool with name '{0}' already registered")]
    DuplicateTool(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),
}

/// Name-keyed tool registry.
///
/// Duplicate names are rejected at registration; the discovered set is
/// read-only after setup and safe to share across concurrent runs.
pub struct ToolRegistry {
    tools: DashMap<String, SharedTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    pub fn register<T>(&self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&self, tool: SharedTool) -> Result<(), RegistryError> {
        let name = tool.name().trim();

        if name.is_empty() {
            return Err(RegistryError::InvalidTool(
                "tool name cannot be empty".to_string(),
            ));
        }

        match self.tools.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateTool(name.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(tool);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn list_tools(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .iter()
            .map(|entry| entry.value().to_schema())
            .collect();
        schemas.sort_by(|left, right| left.function.name.cmp(&right.function.name));
        schemas
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    struct TestTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for TestTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("ok"))
        }
    }

    #[test]
    fn register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(TestTool { name: "echo" }).unwrap();

        assert!(registry.get("echo").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ToolRegistry::new();
        registry.register(TestTool { name: "dup" }).unwrap();

        let second = registry.register(TestTool { name: "dup" });
        assert!(matches!(second, Err(RegistryError::DuplicateTool(name)) if name == "dup"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = ToolRegistry::new();
        let result = registry.register(TestTool { name: " " });
        assert!(matches!(result, Err(RegistryError::InvalidTool(_))));
    }

    #[test]
    fn list_tools_is_sorted_by_name() {
        let registry = ToolRegistry::new();
        registry.register(TestTool { name: "beta" }).unwrap();
        registry.register(TestTool { name: "alpha" }).unwrap();

        let names: Vec<String> = registry
            .list_tools()
            .into_iter()
            .map(|schema| schema.function.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
