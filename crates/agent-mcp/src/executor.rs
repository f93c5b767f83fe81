use std::sync::Arc;

use agent_core::{
    parse_tool_args, validate_tool_args, FunctionSchema, ToolCall, ToolError, ToolExecutor,
    ToolResult, ToolSchema,
};
use async_trait::async_trait;
use tracing::{debug, error};

use crate::protocol::models::{McpContentItem, McpTool};
use crate::session::McpSession;

/// Tool executor backed by a live MCP session.
pub struct McpToolExecutor {
    session: Arc<McpSession>,
}

impl McpToolExecutor {
    pub fn new(session: Arc<McpSession>) -> Self {
        Self { session }
    }

    fn find_tool(&self, name: &str) -> Option<&McpTool> {
        self.session.tools().iter().find(|tool| tool.name == name)
    }

    /// Flattens an MCP content list into one result string.
    fn format_result_content(content: &[McpContentItem]) -> String {
        content
            .iter()
            .map(|item| match item {
                McpContentItem::Text { text } => text.clone(),
                McpContentItem::Image { data, mime_type } => {
                    format!("[Image: {} ({} bytes)]", mime_type, data.len())
                }
                McpContentItem::Resource { resource } => {
                    if let Some(text) = &resource.text {
                        format!("[Resource {}]: {}", resource.uri, text)
                    } else {
                        format!("[Resource {}]", resource.uri)
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool_name = &call.function.name;

        let Some(tool) = self.find_tool(tool_name) else {
            return Err(ToolError::UnknownTool(tool_name.clone()));
        };

        let args = parse_tool_args(&call.function.arguments)?;
        validate_tool_args(&tool.parameters, &args)?;

        debug!(
            "Executing MCP tool '{}' on server '{}'",
            tool_name,
            self.session.server_name()
        );

        match self.session.call_tool(tool_name, args).await {
            Ok(result) => {
                let content = Self::format_result_content(&result.content);
                if result.is_error {
                    Ok(ToolResult::failure(content))
                } else {
                    Ok(ToolResult::ok(content))
                }
            }
            Err(e) => {
                error!("MCP tool execution failed: {}", e);
                Err(ToolError::Execution(format!("MCP error: {e}")))
            }
        }
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.session
            .tools()
            .iter()
            .map(|tool| ToolSchema {
                schema_type: "function".to_string(),
                function: FunctionSchema {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect()
    }
}

/// Composite executor: local tools first, then the MCP provider.
///
/// Only an unknown-tool miss falls through; argument and execution errors
/// from the first executor are final.
pub struct CompositeToolExecutor {
    local: Arc<dyn ToolExecutor>,
    mcp: Arc<dyn ToolExecutor>,
}

impl CompositeToolExecutor {
    pub fn new(local: Arc<dyn ToolExecutor>, mcp: Arc<dyn ToolExecutor>) -> Self {
        Self { local, mcp }
    }
}

#[async_trait]
impl ToolExecutor for CompositeToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        match self.local.execute(call).await {
            Ok(result) => return Ok(result),
            Err(ToolError::UnknownTool(_)) => {}
            Err(e) => return Err(e),
        }

        self.mcp.execute(call).await
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        let mut tools = self.local.list_tools();
        tools.extend(self.mcp.list_tools());
        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::FunctionCall;
    use std::collections::HashMap;

    struct StaticExecutor {
        results: HashMap<String, ToolResult>,
    }

    #[async_trait]
    impl ToolExecutor for StaticExecutor {
        async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
            self.results
                .get(&call.function.name)
                .cloned()
                .ok_or_else(|| ToolError::UnknownTool(call.function.name.clone()))
        }

        fn list_tools(&self) -> Vec<ToolSchema> {
            Vec::new()
        }
    }

    fn make_call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: "{}".to_string(),
            },
        }
    }

    fn executor_with(name: &str, result: &str) -> Arc<dyn ToolExecutor> {
        let mut results = HashMap::new();
        results.insert(name.to_string(), ToolResult::ok(result));
        Arc::new(StaticExecutor { results })
    }

    #[tokio::test]
    async fn composite_prefers_local_executor() {
        let composite = CompositeToolExecutor::new(
            executor_with("shared", "from-local"),
            executor_with("shared", "from-mcp"),
        );

        let result = composite.execute(&make_call("shared")).await.unwrap();
        assert_eq!(result.result, "from-local");
    }

    #[tokio::test]
    async fn composite_falls_through_on_unknown_tool() {
        let composite = CompositeToolExecutor::new(
            executor_with("local_only", "local"),
            executor_with("remote_only", "remote"),
        );

        let result = composite.execute(&make_call("remote_only")).await.unwrap();
        assert_eq!(result.result, "remote");
    }

    #[tokio::test]
    async fn composite_reports_unknown_tool_when_both_miss() {
        let composite = CompositeToolExecutor::new(
            executor_with("a", "a"),
            executor_with("b", "b"),
        );

        let error = composite.execute(&make_call("missing")).await.unwrap_err();
        assert!(matches!(error, ToolError::UnknownTool(name) if name == "missing"));
    }
}
