use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::error::{Result, SlackError};
use crate::types::{
    ApiEnvelope, ChannelListResponse, ConnectionsOpenResponse, MessagesResponse,
    PermalinkResponse, PostMessageResponse, SlackMessage, UsersListResponse,
};

const API_BASE: &str = "https://slack.com/api";

/// Thin Web API client over the bot token.
#[derive(Clone)]
pub struct SlackClient {
    http: Client,
    token: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            token: token.into(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Points the client at a different API root (test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// All replies in a thread, parent first.
    pub async fn thread_replies(&self, channel: &str, thread_ts: &str) -> Result<Vec<SlackMessage>> {
        let response: MessagesResponse = self
            .http
            .get(self.url("conversations.replies"))
            .bearer_auth(&self.token)
            .query(&[("channel", channel), ("ts", thread_ts)])
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(api_error(response.error));
        }
        Ok(response.messages)
    }

    /// Channel history, newest first. `oldest` excludes messages at or
    /// before that timestamp.
    pub async fn channel_history(
        &self,
        channel: &str,
        oldest: Option<&str>,
    ) -> Result<Vec<SlackMessage>> {
        let mut query = vec![("channel", channel.to_string()), ("limit", "200".to_string())];
        if let Some(oldest) = oldest {
            query.push(("oldest", oldest.to_string()));
        }

        let response: MessagesResponse = self
            .http
            .get(self.url("conversations.history"))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(api_error(response.error));
        }
        Ok(response.messages)
    }

    /// Resolves a channel name to its id, paging through the list.
    pub async fn channel_id_by_name(&self, name: &str) -> Result<String> {
        let mut cursor = String::new();
        loop {
            let mut query = vec![("limit", "200".to_string())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }

            let response: ChannelListResponse = self
                .http
                .get(self.url("conversations.list"))
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await?
                .json()
                .await?;
            if !response.ok {
                return Err(api_error(response.error));
            }

            if let Some(channel) = response.channels.iter().find(|c| c.name == name) {
                debug!("Resolved channel '{}' to {}", name, channel.id);
                return Ok(channel.id.clone());
            }

            cursor = response
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                return Err(SlackError::ChannelNotFound(name.to_string()));
            }
        }
    }

    /// Posts into a thread and returns the new message's timestamp.
    pub async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<String> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = json!(thread_ts);
        }

        let response: PostMessageResponse = self
            .http
            .post(self.url("chat.postMessage"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(api_error(response.error));
        }
        response
            .ts
            .ok_or_else(|| SlackError::Api("chat.postMessage returned no ts".to_string()))
    }

    /// Rewrites an already posted message in place.
    pub async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<()> {
        let response: ApiEnvelope = self
            .http
            .post(self.url("chat.update"))
            .bearer_auth(&self.token)
            .json(&json!({ "channel": channel, "ts": ts, "text": text }))
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(api_error(response.error));
        }
        Ok(())
    }

    pub async fn permalink(&self, channel: &str, message_ts: &str) -> Result<String> {
        let response: PermalinkResponse = self
            .http
            .get(self.url("chat.getPermalink"))
            .bearer_auth(&self.token)
            .query(&[("channel", channel), ("message_ts", message_ts)])
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(api_error(response.error));
        }
        response
            .permalink
            .ok_or_else(|| SlackError::Api("chat.getPermalink returned no link".to_string()))
    }

    /// Every workspace member as id -> display name.
    pub async fn user_directory(&self) -> Result<HashMap<String, String>> {
        let mut users = HashMap::new();
        let mut cursor = String::new();
        loop {
            let mut query = vec![("limit", "200".to_string())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }

            let response: UsersListResponse = self
                .http
                .get(self.url("users.list"))
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await?
                .json()
                .await?;
            if !response.ok {
                return Err(api_error(response.error));
            }

            for member in response.members {
                let name = member.real_name.unwrap_or(member.name);
                users.insert(member.id, name);
            }

            cursor = response
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                return Ok(users);
            }
        }
    }

    /// Opens a Socket Mode connection slot with the app-level token and
    /// returns the WebSocket URL to dial.
    pub async fn connections_open(&self, app_token: &str) -> Result<String> {
        let response: ConnectionsOpenResponse = self
            .http
            .post(self.url("apps.connections.open"))
            .bearer_auth(app_token)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(api_error(response.error));
        }
        response
            .url
            .ok_or_else(|| SlackError::Socket("apps.connections.open returned no url".to_string()))
    }
}

fn api_error(error: Option<String>) -> SlackError {
    SlackError::Api(error.unwrap_or_else(|| "unknown_error".to_string()))
}
