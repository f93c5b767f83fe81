use agent_core::{
    parse_tool_args, validate_tool_args, ToolCall, ToolError, ToolExecutor, ToolRegistry,
    ToolResult, ToolSchema,
};
use async_trait::async_trait;
use tracing::debug;

/// Executor over locally registered tools, dispatching by name lookup.
pub struct BuiltinToolExecutor {
    registry: ToolRegistry,
}

impl BuiltinToolExecutor {
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    pub fn with_registry(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

impl Default for BuiltinToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for BuiltinToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let name = &call.function.name;
        let Some(tool) = self.registry.get(name) else {
            return Err(ToolError::UnknownTool(name.clone()));
        };

        let args = parse_tool_args(&call.function.arguments)?;
        validate_tool_args(&tool.parameters_schema(), &args)?;

        debug!("Executing local tool '{}'", name);
        tool.execute(args).await
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.registry.list_tools()
    }
}
