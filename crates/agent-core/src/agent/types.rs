use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::ToolCall;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single entry in the conversation log.
///
/// Assistant messages may carry pending tool invocations; tool messages
/// answer exactly one of those invocations via `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_id", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, None, None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None, None)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        let tool_calls = tool_calls.filter(|calls| !calls.is_empty());
        Self::new(Role::Assistant, content, tool_calls, None)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content, None, Some(tool_call_id.into()))
    }

    fn new(
        role: Role,
        content: impl Into<String>,
        tool_calls: Option<Vec<ToolCall>>,
        tool_call_id: Option<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            tool_calls,
            tool_call_id,
            created_at: Utc::now(),
        }
    }

    /// Canonical view of the invocations this message is waiting on.
    ///
    /// Provider responses are normalized into `tool_calls` at parse time
    /// (including the legacy single-function encoding), so this is the only
    /// place routing needs to look.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match (&self.role, &self.tool_calls) {
            (Role::Assistant, Some(calls)) => calls.as_slice(),
            _ => &[],
        }
    }
}

/// Ordered, append-only message log for one orchestration run.
///
/// Insertion order defines the turn order fed to the model. A conversation
/// is owned by exactly one run; it is never shared across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a conversation seeded with a single user message.
    pub fn from_user_input(input: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.push(Message::user(input));
        conversation
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ensures the log starts with the given system directive.
    ///
    /// If a system message is already present its content is replaced;
    /// otherwise one is prepended. Keeps the single-system-message shape
    /// the chat completion API expects.
    pub fn set_system_directive(&mut self, directive: impl Into<String>) {
        let directive = directive.into();
        match self.messages.iter_mut().find(|m| m.role == Role::System) {
            Some(existing) => existing.content = directive,
            None => self.messages.insert(0, Message::system(directive)),
        }
    }
}
