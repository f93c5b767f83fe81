use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use agent_core::{AgentError, Conversation, ToolExecutor};
use agent_llm::LLMProvider;
use agent_mcp::{CompositeToolExecutor, McpServerConfig, McpSession, McpToolExecutor};

use crate::config::AgentLoopConfig;
use crate::runner::run_agent_loop;

/// One run-scoped agent session.
///
/// Opening a session acquires the tool-provider connection; closing (or
/// dropping) it releases the connection. The session is not reused across
/// runs: each incoming request opens its own.
pub struct AgentSession {
    llm: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    mcp: Option<Arc<McpSession>>,
    config: AgentLoopConfig,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("mcp", &self.mcp.is_some())
            .field("config", &self.config)
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl AgentSession {
    /// Opens a session over local tools plus an optional MCP provider.
    ///
    /// A provider that cannot be reached, or that fails the handshake or
    /// tool discovery, aborts the open; nothing from this session reaches
    /// the model in that case.
    pub async fn open(
        llm: Arc<dyn LLMProvider>,
        local_tools: Arc<dyn ToolExecutor>,
        mcp_config: Option<McpServerConfig>,
        config: AgentLoopConfig,
    ) -> Result<Self, AgentError> {
        let (tools, mcp): (Arc<dyn ToolExecutor>, Option<Arc<McpSession>>) = match mcp_config {
            Some(server) => {
                let session = McpSession::connect(server)
                    .await
                    .map(Arc::new)
                    .map_err(|e| AgentError::ProviderConnection(e.to_string()))?;
                let remote = Arc::new(McpToolExecutor::new(Arc::clone(&session)));
                let composite = CompositeToolExecutor::new(local_tools, remote);
                (Arc::new(composite), Some(session))
            }
            None => (local_tools, None),
        };

        Ok(Self {
            llm,
            tools,
            mcp,
            config,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Runs the loop over an existing conversation.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String, AgentError> {
        run_agent_loop(
            conversation,
            Arc::clone(&self.llm),
            Arc::clone(&self.tools),
            self.cancel_token.clone(),
            &self.config,
        )
        .await
    }

    /// Convenience for the single-question case.
    pub async fn run_input(&self, input: impl Into<String>) -> Result<String, AgentError> {
        let mut conversation = Conversation::from_user_input(input);
        self.run(&mut conversation).await
    }

    /// Releases the provider connection.
    ///
    /// Runs on every exit path in practice: even without an explicit close,
    /// dropping the session drops the last strong reference to the MCP
    /// session, which aborts its background reader.
    pub async fn close(self) {
        let AgentSession { tools, mcp, .. } = self;
        // The composite executor holds its own reference to the session.
        drop(tools);
        if let Some(session) = mcp {
            match Arc::try_unwrap(session) {
                Ok(session) => {
                    info!("Closing MCP session");
                    session.close().await;
                }
                Err(_) => warn!("MCP session still referenced at close; teardown deferred to drop"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use agent_core::{Message, ToolRegistry, ToolSchema};
    use agent_llm::LLMError;
    use agent_tools::{AddTwoNumbersTool, BuiltinToolExecutor};
    use async_trait::async_trait;

    struct CannedLlm;

    #[async_trait]
    impl LLMProvider for CannedLlm {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> Result<Message, LLMError> {
            Ok(Message::assistant(
                r#"{"analysis": "trivial", "answer": "ok"}"#,
                None,
            ))
        }
    }

    fn local_tools() -> Arc<dyn ToolExecutor> {
        let registry = ToolRegistry::new();
        registry.register(AddTwoNumbersTool::new()).unwrap();
        Arc::new(BuiltinToolExecutor::with_registry(registry))
    }

    #[tokio::test]
    async fn unreachable_provider_fails_the_open() {
        let config = McpServerConfig {
            connect_timeout_ms: 500,
            ..McpServerConfig::new("http://127.0.0.1:9/sse")
        };

        let error = AgentSession::open(
            Arc::new(CannedLlm),
            local_tools(),
            Some(config),
            AgentLoopConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AgentError::ProviderConnection(_)));
    }

    #[tokio::test]
    async fn session_without_provider_runs_on_local_tools() {
        let session = AgentSession::open(
            Arc::new(CannedLlm),
            local_tools(),
            None,
            AgentLoopConfig::default(),
        )
        .await
        .unwrap();

        let answer = session.run_input("hello").await.unwrap();
        assert_eq!(answer, "ok");
        session.close().await;
    }
}
