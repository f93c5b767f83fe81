use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, error, warn};

use crate::error::{McpError, Result};
use crate::protocol::models::*;

/// Transport seam for MCP communication.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&mut self) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;
    async fn send(&self, message: String) -> Result<()>;
    async fn receive(&self) -> Result<Option<String>>;
    fn is_connected(&self) -> bool;
}

struct PendingRequest {
    sender: oneshot::Sender<Result<JsonRpcResponse>>,
}

/// JSON-RPC 2.0 client over an [`McpTransport`].
///
/// A background reader task pairs incoming responses with pending requests
/// by id; requests time out individually.
pub struct McpProtocolClient {
    transport: Arc<RwLock<Box<dyn McpTransport>>>,
    next_id: AtomicU64,
    pending_requests: Arc<DashMap<u64, PendingRequest>>,
    reader_handle: Option<tokio::task::JoinHandle<()>>,
}

impl McpProtocolClient {
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self {
            transport: Arc::new(RwLock::new(transport)),
            next_id: AtomicU64::new(1),
            pending_requests: Arc::new(DashMap::new()),
            reader_handle: None,
        }
    }

    pub async fn connect(&mut self) -> Result<()> {
        {
            let mut transport = self.transport.write().await;
            transport.connect().await?;
        }
        self.start_reader();
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        let mut transport = self.transport.write().await;
        transport.disconnect().await
    }

    fn start_reader(&mut self) {
        let transport = Arc::clone(&self.transport);
        let pending_requests = Arc::clone(&self.pending_requests);

        let handle = tokio::spawn(async move {
            loop {
                let received = {
                    let transport = transport.read().await;
                    if !transport.is_connected() {
                        break;
                    }
                    transport.receive().await
                };

                match received {
                    Ok(Some(message)) => {
                        debug!("Received message: {}", message);
                        if let Err(e) = Self::handle_message(&message, &pending_requests) {
                            warn!("Failed to handle message: {}", e);
                        }
                    }
                    Ok(None) => {
                        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                    }
                    Err(e) => {
                        error!("Transport error: {}", e);
                        break;
                    }
                }
            }
        });

        self.reader_handle = Some(handle);
    }

    fn handle_message(
        message: &str,
        pending_requests: &DashMap<u64, PendingRequest>,
    ) -> Result<()> {
        if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(message) {
            if let Some((_, request)) = pending_requests.remove(&response.id) {
                let _ = request.sender.send(Ok(response));
            }
            return Ok(());
        }

        // Notifications carry no id; nothing here consumes them yet.
        if serde_json::from_str::<JsonRpcNotification>(message).is_ok() {
            return Ok(());
        }

        Err(McpError::Protocol("Unknown message type".to_string()))
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout_ms: u64,
    ) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let request_json = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending_requests.insert(id, PendingRequest { sender: tx });

        {
            let transport = self.transport.read().await;
            transport.send(request_json).await?;
        }

        match tokio::time::timeout(tokio::time::Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(Ok(response))) => {
                if let Some(error) = response.error {
                    Err(McpError::Protocol(format!(
                        "{}: {}",
                        error.code, error.message
                    )))
                } else {
                    Ok(response)
                }
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(McpError::Disconnected),
            Err(_) => {
                self.pending_requests.remove(&id);
                Err(McpError::Timeout(format!(
                    "Request {id} timed out after {timeout_ms}ms"
                )))
            }
        }
    }

    /// Performs the capability handshake and sends the initialized
    /// notification.
    pub async fn initialize(&self, timeout_ms: u64) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;
        let response = self
            .send_request("initialize", Some(params), timeout_ms)
            .await?;

        let result: McpInitializeResult = serde_json::from_value(
            response
                .result
                .ok_or_else(|| McpError::Protocol("Missing result".to_string()))?,
        )?;

        let initialized = JsonRpcNotification {
            jsonrpc: "2.0".to_string(),
            method: "notifications/initialized".to_string(),
            params: None,
        };
        {
            let transport = self.transport.read().await;
            transport.send(serde_json::to_string(&initialized)?).await?;
        }

        Ok(result)
    }

    pub async fn list_tools(&self, timeout_ms: u64) -> Result<Vec<McpTool>> {
        let response = self.send_request("tools/list", None, timeout_ms).await?;

        let result: McpToolListResult = serde_json::from_value(
            response
                .result
                .ok_or_else(|| McpError::Protocol("Missing result".to_string()))?,
        )?;

        Ok(result
            .tools
            .into_iter()
            .map(|t| McpTool {
                name: t.name,
                description: t.description,
                parameters: t.input_schema.unwrap_or_else(|| serde_json::json!({})),
            })
            .collect())
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout_ms: u64,
    ) -> Result<McpToolCallResult> {
        let request = McpToolCallRequest {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let params = serde_json::to_value(request)?;

        let response = self
            .send_request("tools/call", Some(params), timeout_ms)
            .await?;

        let result: McpToolCallResult = serde_json::from_value(
            response
                .result
                .ok_or_else(|| McpError::Protocol("Missing result".to_string()))?,
        )?;

        Ok(result)
    }
}

impl Drop for McpProtocolClient {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
    }
}
