use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("embedding error: {0}")]
    Embedding(#[from] agent_llm::LLMError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
