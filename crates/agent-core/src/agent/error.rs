use thiserror::Error;

/// Fatal, run-level failures surfaced to the caller.
///
/// Tool-level failures are deliberately absent: they are recovered into the
/// conversation as tool-result messages (see `agent-loop`) instead of
/// aborting the run.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model backend unavailable: {0}")]
    ModelUnavailable(String),

    #[error("tool provider connection failed: {0}")]
    ProviderConnection(String),

    #[error("malformed structured answer: {0}")]
    MalformedAnswer(String),

    #[error("cancelled")]
    Cancelled,
}
