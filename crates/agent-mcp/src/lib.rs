//! MCP (Model Context Protocol) client.
//!
//! Connects the agent to a remote tool provider over SSE, performs the
//! capability handshake, discovers tools and dispatches tool calls. The
//! [`McpSession`] type scopes one connection to one orchestration run and
//! guarantees teardown on every exit path.

pub mod config;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod session;
pub mod transports;

pub use config::{HeaderConfig, McpServerConfig};
pub use error::{McpError, Result};
pub use executor::{CompositeToolExecutor, McpToolExecutor};
pub use protocol::{McpProtocolClient, McpTransport};
pub use session::McpSession;
pub use transports::SseTransport;
