use thiserror::Error;

pub type Result<T> = std::result::Result<T, SlackError>;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Web API returned `ok: false` with an error code.
    #[error("Slack API error: {0}")]
    Api(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Socket Mode error: {0}")]
    Socket(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for SlackError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SlackError::Socket(e.to_string())
    }
}
