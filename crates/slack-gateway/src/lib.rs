//! Slack integration: Web API client, Socket Mode event stream and the
//! workspace user directory.

pub mod client;
pub mod error;
pub mod socket;
pub mod types;
pub mod users;

pub use client::SlackClient;
pub use error::{Result, SlackError};
pub use socket::SocketModeClient;
pub use types::{AppMention, SlackMessage};
pub use users::UserDirectory;
