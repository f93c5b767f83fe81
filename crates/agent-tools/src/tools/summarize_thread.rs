use std::sync::Arc;

use agent_core::{Message, Tool, ToolError, ToolResult};
use agent_llm::LLMProvider;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

/// Summarizes a thread transcript with its own model call.
///
/// A failed summarization degrades to an apology result instead of
/// erroring, so the main loop can still answer around it.
pub struct SummarizeThreadTool {
    llm: Arc<dyn LLMProvider>,
}

impl SummarizeThreadTool {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for SummarizeThreadTool {
    fn name(&self) -> &str {
        "summarize_thread"
    }

    fn description(&self) -> &str {
        "Use this to summarize a thread"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "thread": {
                    "type": "string",
                    "description": "Thread content to summarize"
                }
            },
            "required": ["thread"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError> {
        let thread = args
            .get("thread")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("'thread' must be a string".to_string()))?;

        info!("Summarizing thread of {} chars", thread.len());

        let prompt = format!("Summarize the following thread:\n{thread}");
        let messages = vec![Message::user(prompt)];

        match self.llm.chat(&messages, &[]).await {
            Ok(response) => Ok(ToolResult::ok(response.content)),
            Err(e) => {
                warn!("Thread summarization failed: {}", e);
                Ok(ToolResult::failure(
                    "Sorry, I could not summarize this thread.",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolSchema;
    use agent_llm::LLMError;

    struct ScriptedLlm {
        reply: Option<String>,
    }

    #[async_trait]
    impl LLMProvider for ScriptedLlm {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> Result<Message, LLMError> {
            match &self.reply {
                Some(reply) => Ok(Message::assistant(reply.clone(), None)),
                None => Err(LLMError::Api("backend down".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn returns_model_summary() {
        let tool = SummarizeThreadTool::new(Arc::new(ScriptedLlm {
            reply: Some("They agreed to ship on Friday.".to_string()),
        }));

        let result = tool
            .execute(json!({"thread": "alice: ship friday?\nbob: yes"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.result.contains("Friday"));
    }

    #[tokio::test]
    async fn model_failure_degrades_to_apology() {
        let tool = SummarizeThreadTool::new(Arc::new(ScriptedLlm { reply: None }));

        let result = tool.execute(json!({"thread": "t"})).await.unwrap();
        assert!(!result.success);
        assert!(result.result.contains("could not summarize"));
    }
}
