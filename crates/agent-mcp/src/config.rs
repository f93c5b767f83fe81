use serde::{Deserialize, Serialize};

/// Configuration for one MCP server connection (SSE transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// SSE endpoint URL.
    pub url: String,
    /// Additional headers sent on every request.
    #[serde(default)]
    pub headers: Vec<HeaderConfig>,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl McpServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_request_timeout() -> u64 {
    60_000
}

/// HTTP header configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}
