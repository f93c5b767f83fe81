//! Connection-scoped MCP session.
//!
//! `connect` opens the transport, runs the capability handshake and
//! discovers the server's tools in one step; `close` (or drop) tears the
//! connection down. One session is scoped to one orchestration run.

use serde_json::Value;
use tracing::{info, warn};

use crate::config::McpServerConfig;
use crate::error::Result;
use crate::protocol::models::{McpTool, McpToolCallResult};
use crate::protocol::McpProtocolClient;
use crate::transports::SseTransport;

pub struct McpSession {
    client: McpProtocolClient,
    tools: Vec<McpTool>,
    request_timeout_ms: u64,
    server_name: String,
}

impl McpSession {
    /// Connects, performs the handshake and discovers tools.
    ///
    /// Any failure here means the run never starts; callers surface it as a
    /// provider-connection error.
    pub async fn connect(config: McpServerConfig) -> Result<Self> {
        let request_timeout_ms = config.request_timeout_ms;
        let transport = SseTransport::new(config);
        let mut client = McpProtocolClient::new(Box::new(transport));

        client.connect().await?;

        let init = match client.initialize(request_timeout_ms).await {
            Ok(init) => init,
            Err(e) => {
                // Connection is half-open at this point; tear it down before
                // reporting the handshake failure.
                if let Err(disconnect_err) = client.disconnect().await {
                    warn!("Teardown after failed handshake also failed: {}", disconnect_err);
                }
                return Err(e);
            }
        };
        info!(
            "MCP session established with {} v{}",
            init.server_info.name, init.server_info.version
        );

        let tools = match client.list_tools(request_timeout_ms).await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(disconnect_err) = client.disconnect().await {
                    warn!("Teardown after failed discovery also failed: {}", disconnect_err);
                }
                return Err(e);
            }
        };
        info!("Discovered {} MCP tools", tools.len());

        Ok(Self {
            client,
            tools,
            request_timeout_ms,
            server_name: init.server_info.name,
        })
    }

    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolCallResult> {
        self.client
            .call_tool(name, arguments, self.request_timeout_ms)
            .await
    }

    /// Releases the provider connection.
    ///
    /// Dropping the session aborts the background reader as well, so the
    /// connection is released on every exit path even without an explicit
    /// close.
    pub async fn close(mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("MCP session teardown failed: {}", e);
        }
    }
}
