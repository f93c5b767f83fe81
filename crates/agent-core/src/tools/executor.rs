use async_trait::async_trait;
use thiserror::Error;

use crate::tools::{ToolCall, ToolResult, ToolSchema};

/// Recoverable tool-level failures.
///
/// None of these abort an orchestration run: the loop converts them into
/// tool-result messages so the model can adapt on its next turn.
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool execution failed: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Dispatch seam between the orchestration loop and whatever can run tools
/// (local registry, MCP server, or a composite of both).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
    fn list_tools(&self) -> Vec<ToolSchema>;
}

/// Parses the raw argument string of a tool call into a JSON object.
pub fn parse_tool_args(arguments: &str) -> Result<serde_json::Value> {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::json!({}));
    }

    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))?;

    if !value.is_object() {
        return Err(ToolError::InvalidArguments(
            "arguments must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Validates parsed arguments against a tool's declared parameter schema.
///
/// Checks the `required` list and the primitive `type` of each declared
/// property. This is deliberately shallow: tools get well-shaped input,
/// deeper validation stays inside the tool.
pub fn validate_tool_args(schema: &serde_json::Value, args: &serde_json::Value) -> Result<()> {
    let Some(args_object) = args.as_object() else {
        return Err(ToolError::InvalidArguments(
            "arguments must be a JSON object".to_string(),
        ));
    };

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for field in required.iter().filter_map(|v| v.as_str()) {
            if !args_object.contains_key(field) {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required argument '{field}'"
                )));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return Ok(());
    };

    for (name, value) in args_object {
        let Some(expected) = properties
            .get(name)
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str())
        else {
            continue;
        };

        let matches = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !matches {
            return Err(ToolError::InvalidArguments(format!(
                "argument '{name}' should be of type {expected}"
            )));
        }
    }

    Ok(())
}
