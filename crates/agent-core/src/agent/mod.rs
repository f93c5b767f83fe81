pub mod error;
pub mod types;

pub use error::AgentError;
pub use types::{Conversation, Message, Role};
