use agent_core::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::json;

pub struct AddTwoNumbersTool;

impl AddTwoNumbersTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AddTwoNumbersTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AddTwoNumbersTool {
    fn name(&self) -> &str {
        "add_two_numbers"
    }

    fn description(&self) -> &str {
        "Add two numbers"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer", "description": "First number"},
                "b": {"type": "integer", "description": "Second number"}
            },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError> {
        let a = args
            .get("a")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ToolError::InvalidArguments("'a' must be an integer".to_string()))?;
        let b = args
            .get("b")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ToolError::InvalidArguments("'b' must be an integer".to_string()))?;

        let sum = a
            .checked_add(b)
            .ok_or_else(|| ToolError::Execution(format!("{a} + {b} overflows")))?;

        Ok(ToolResult::ok(sum.to_string()))
    }
}
