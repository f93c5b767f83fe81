pub mod agent;
pub mod answer;
pub mod tools;

pub use agent::error::AgentError;
pub use agent::types::{Conversation, Message, Role};
pub use answer::{parse_structured_answer, structured_answer_instructions, StructuredAnswer};
pub use tools::{
    parse_tool_args, validate_tool_args, FunctionCall, FunctionSchema, RegistryError, Tool,
    ToolCall, ToolError, ToolExecutor, ToolRegistry, ToolResult, ToolSchema,
};
