//! SSE transport for MCP.
//!
//! The server pushes JSON-RPC messages over a long-lived `text/event-stream`
//! response; the client sends its own messages by POSTing to the endpoint
//! URL the server announces in its first `endpoint` event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Client;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::{HeaderConfig, McpServerConfig};
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

pub struct SseTransport {
    config: McpServerConfig,
    client: Client,
    connected: Arc<AtomicBool>,
    message_tx: mpsc::Sender<String>,
    message_rx: Mutex<mpsc::Receiver<String>>,
    endpoint_url: Arc<Mutex<Option<String>>>,
    sse_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SseTransport {
    pub fn new(config: McpServerConfig) -> Self {
        let (message_tx, message_rx) = mpsc::channel(100);
        Self {
            config,
            client: Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            message_tx,
            message_rx: Mutex::new(message_rx),
            endpoint_url: Arc::new(Mutex::new(None)),
            sse_handle: None,
        }
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        for HeaderConfig { name, value } in &self.config.headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {e}")))?;
            let header_value = value
                .parse()
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header value: {e}")))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    /// Resolves the endpoint announced by the server, which may be either
    /// absolute or a path relative to the SSE URL's origin.
    fn resolve_endpoint(base_url: &str, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let origin = base_url
            .find("://")
            .and_then(|scheme_end| {
                base_url[scheme_end + 3..]
                    .find('/')
                    .map(|path_start| &base_url[..scheme_end + 3 + path_start])
            })
            .unwrap_or(base_url);
        format!("{}{}", origin.trim_end_matches('/'), endpoint)
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(&mut self) -> Result<()> {
        info!("Connecting to MCP SSE endpoint: {}", self.config.url);

        let mut headers = self.build_headers()?;
        headers.insert(
            reqwest::header::ACCEPT,
            "text/event-stream"
                .parse()
                .map_err(|_| McpError::InvalidConfig("invalid accept header".to_string()))?,
        );

        let response = self
            .client
            .get(&self.config.url)
            .headers(headers)
            .timeout(tokio::time::Duration::from_millis(
                self.config.connect_timeout_ms,
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(McpError::Connection(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let message_tx = self.message_tx.clone();
        let endpoint_url = Arc::clone(&self.endpoint_url);
        let connected = Arc::clone(&self.connected);
        let base_url = self.config.url.clone();

        let handle = tokio::spawn(async move {
            let mut stream = response.bytes_stream().eventsource();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(event) => {
                        if event.event == "endpoint" {
                            let resolved = Self::resolve_endpoint(&base_url, &event.data);
                            debug!("Got message endpoint: {}", resolved);
                            *endpoint_url.lock().await = Some(resolved);
                        } else if event.event == "message" || event.event.is_empty() {
                            if message_tx.send(event.data).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("SSE stream error: {}", e);
                        break;
                    }
                }
            }
            warn!("SSE stream ended for {}", base_url);
            connected.store(false, Ordering::SeqCst);
        });

        self.sse_handle = Some(handle);
        self.connected.store(true, Ordering::SeqCst);

        info!("MCP SSE transport connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self.sse_handle.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let endpoint = self.endpoint_url.lock().await.clone();
        // FastMCP announces /messages via the endpoint event; fall back to
        // the conventional path if the event has not arrived.
        let post_url = endpoint.unwrap_or_else(|| {
            format!("{}/messages", self.config.url.trim_end_matches("/sse"))
        });

        let headers = self.build_headers()?;
        let response = self
            .client
            .post(&post_url)
            .headers(headers)
            .header("Content-Type", "application/json")
            .body(message)
            .timeout(tokio::time::Duration::from_millis(
                self.config.request_timeout_ms,
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST failed: {status} - {body}"
            )));
        }

        debug!("Sent message via POST to {}", post_url);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        let mut rx = self.message_rx.lock().await;
        match rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(McpError::Disconnected),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.sse_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_endpoint_against_origin() {
        let resolved = SseTransport::resolve_endpoint(
            "http://localhost:8000/sse",
            "/messages/?session_id=abc",
        );
        assert_eq!(resolved, "http://localhost:8000/messages/?session_id=abc");
    }

    #[test]
    fn keeps_absolute_endpoint_untouched() {
        let resolved =
            SseTransport::resolve_endpoint("http://localhost:8000/sse", "http://other/m");
        assert_eq!(resolved, "http://other/m");
    }
}
