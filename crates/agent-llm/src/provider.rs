use agent_core::{Message, ToolSchema};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

/// Opaque model backend boundary.
///
/// One call per model turn: the full conversation plus the bound tool set
/// go in, one assistant message comes back. Pending tool invocations are
/// already normalized into the message's canonical `tool_calls` list, so
/// callers never see provider-specific encodings.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Message>;
}

/// Embedding backend boundary, consumed by the document index.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
