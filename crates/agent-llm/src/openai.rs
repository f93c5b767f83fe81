//! OpenAI-compatible chat completions and embeddings over plain HTTP.
//!
//! Request bodies follow the OpenAI wire shape without leaking internal
//! `Message` fields (`id`, `created_at`). Responses are normalized into the
//! canonical message form: both the `tool_calls` array and the deprecated
//! single `function_call` object become `Message::tool_calls`.

use agent_core::{FunctionCall, Message, Role, ToolCall, ToolSchema};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{EmbeddingProvider, LLMError, LLMProvider, Result};

/// Call identifier for responses that carry none (legacy encoding).
fn generate_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    embedding_model: String,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: 0.5,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_chat_body(&self, messages: &[Message], tools: &[ToolSchema]) -> Value {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages_to_wire_json(messages),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        body
    }
}

/// Converts internal messages to the chat completions `messages` array.
pub fn messages_to_wire_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };

            let mut msg = json!({
                "role": role,
                "content": m.content,
            });

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }
            if let Some(tool_calls) = &m.tool_calls {
                msg["tool_calls"] = json!(tool_calls);
            }

            msg
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
    /// Deprecated single-call encoding still emitted by some backends.
    #[serde(default)]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    tool_type: Option<String>,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Normalizes a wire message into the canonical assistant message.
fn normalize_response_message(wire: WireMessage) -> Message {
    let content = wire.content.unwrap_or_default();

    let mut calls: Vec<ToolCall> = wire
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|call| {
            let name = call.function.name?;
            Some(ToolCall {
                id: call.id.unwrap_or_else(generate_call_id),
                tool_type: call.tool_type.unwrap_or_else(|| "function".to_string()),
                function: FunctionCall {
                    name,
                    arguments: call.function.arguments.unwrap_or_else(|| "{}".to_string()),
                },
            })
        })
        .collect();

    if calls.is_empty() {
        if let Some(function_call) = wire.function_call {
            if let Some(name) = function_call.name {
                calls.push(ToolCall {
                    id: generate_call_id(),
                    tool_type: "function".to_string(),
                    function: FunctionCall {
                        name,
                        arguments: function_call.arguments.unwrap_or_else(|| "{}".to_string()),
                    },
                });
            }
        }
    }

    Message::assistant(content, (!calls.is_empty()).then_some(calls))
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Message> {
        let body = self.build_chat_body(messages, tools);
        debug!(model = %self.model, message_count = messages.len(), "chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(LLMError::Api(format!("{status}: {detail}")));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Api("response carried no choices".to_string()))?;

        Ok(normalize_response_message(choice.message))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.embedding_model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(LLMError::Api(format!("{status}: {detail}")));
        }

        let mut payload: EmbeddingResponse = response.json().await?;
        payload.data.sort_by_key(|d| d.index);
        Ok(payload.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_json_omits_internal_fields() {
        let messages = vec![Message::user("hi")];
        let wire = messages_to_wire_json(&messages);

        assert_eq!(wire[0]["role"], "user");
        assert_eq!(wire[0]["content"], "hi");
        assert!(wire[0].get("id").is_none());
        assert!(wire[0].get("created_at").is_none());
    }

    #[test]
    fn wire_json_carries_tool_result_pairing() {
        let messages = vec![Message::tool_result("call_7", "8246246")];
        let wire = messages_to_wire_json(&messages);

        assert_eq!(wire[0]["role"], "tool");
        assert_eq!(wire[0]["tool_call_id"], "call_7");
    }

    #[test]
    fn normalizes_primary_tool_call_encoding() {
        let wire: WireMessage = serde_json::from_value(json!({
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "add_two_numbers", "arguments": "{\"a\":1,\"b\":2}"}
            }]
        }))
        .unwrap();

        let message = normalize_response_message(wire);
        let calls = message.pending_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "add_two_numbers");
        assert_eq!(calls[0].id, "call_1");
    }

    #[test]
    fn normalizes_legacy_function_call_encoding() {
        let wire: WireMessage = serde_json::from_value(json!({
            "content": "",
            "function_call": {"name": "summarize_thread", "arguments": "{\"thread\":\"t\"}"}
        }))
        .unwrap();

        let message = normalize_response_message(wire);
        let calls = message.pending_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "summarize_thread");
        assert!(!calls[0].id.is_empty());
    }

    #[test]
    fn plain_text_response_has_no_pending_calls() {
        let wire: WireMessage = serde_json::from_value(json!({
            "content": "{\"analysis\": \"done\", \"answer\": \"42\"}"
        }))
        .unwrap();

        let message = normalize_response_message(wire);
        assert!(message.pending_tool_calls().is_empty());
        assert!(message.content.contains("42"));
    }
}
