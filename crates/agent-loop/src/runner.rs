use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use agent_core::{
    parse_structured_answer, structured_answer_instructions, AgentError, Conversation, Message,
    ToolCall, ToolExecutor,
};
use agent_llm::LLMProvider;

use crate::config::AgentLoopConfig;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Answer returned when the turn cap forces termination.
const TURN_LIMIT_ANSWER: &str =
    "Sorry, I could not finish working on this request. Please try rephrasing it.";

const DEFAULT_PERSONA: &str = "You are a helpful assistant for this chat workspace. \
Answer only from verified information from the conversation or your tools; \
if you are not sure, say \"I don't know\". \
Always answer in the same language the user wrote in.";

/// Where the loop goes after a model turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ToolExec,
    End,
}

/// The single decision point governing loop continuation.
///
/// Pure function of the latest message: an assistant message with pending
/// invocations routes to tool execution, anything else terminates the run.
pub fn route_after_model_turn(latest: &Message) -> Route {
    if latest.pending_tool_calls().is_empty() {
        Route::End
    } else {
        Route::ToolExec
    }
}

fn system_directive(config: &AgentLoopConfig) -> String {
    let persona = config.system_prompt.as_deref().unwrap_or(DEFAULT_PERSONA);
    format!("{persona}\n\n{}", structured_answer_instructions())
}

/// Runs the orchestration state machine to completion and returns the
/// validated answer string.
///
/// Model-level failures abort the run; tool-level failures are converted
/// into tool-result messages so the model can adapt on its next turn.
pub async fn run_agent_loop(
    conversation: &mut Conversation,
    llm: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolExecutor>,
    cancel_token: CancellationToken,
    config: &AgentLoopConfig,
) -> Result<String> {
    conversation.set_system_directive(system_directive(config));
    let tool_schemas = tools.list_tools();

    for turn in 0..config.max_turns {
        if cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        debug!(turn, messages = conversation.len(), "model turn");
        let response = llm
            .chat(conversation.messages(), &tool_schemas)
            .await
            .map_err(|e| AgentError::ModelUnavailable(e.to_string()))?;
        let route = route_after_model_turn(&response);
        let pending = response.pending_tool_calls().to_vec();
        let terminal = response.content.clone();
        conversation.push(response);

        match route {
            Route::End => return finalize_answer(&terminal, config),
            Route::ToolExec => {
                let results = execute_pending_calls(&pending, tools.as_ref()).await;
                for message in results {
                    conversation.push(message);
                }
            }
        }
    }

    warn!(
        max_turns = config.max_turns,
        "turn cap reached, forcing termination"
    );
    Ok(TURN_LIMIT_ANSWER.to_string())
}

/// Fans out every pending invocation, joins them all and pairs each result
/// with its originating call identifier.
///
/// Order among the results is not significant; failures become result text
/// rather than errors.
async fn execute_pending_calls(
    pending: &[ToolCall],
    tools: &dyn ToolExecutor,
) -> Vec<Message> {
    let executions = pending.iter().map(|call| async move {
        let content = match tools.execute(call).await {
            Ok(result) => result.result,
            Err(e) => {
                warn!("Tool call '{}' failed: {}", call.function.name, e);
                format!("Tool call failed: {e}")
            }
        };
        Message::tool_result(call.id.clone(), content)
    });

    join_all(executions).await
}

fn finalize_answer(terminal: &str, config: &AgentLoopConfig) -> Result<String> {
    match parse_structured_answer(terminal) {
        Ok(answer) => Ok(answer.answer),
        Err(e) if config.fallback_to_raw_answer => {
            warn!("Structured parse failed, falling back to raw text: {}", e);
            Ok(terminal.to_string())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use agent_core::{FunctionCall, ToolRegistry, ToolSchema};
    use agent_llm::LLMError;
    use agent_tools::{AddTwoNumbersTool, BuiltinToolExecutor};
    use async_trait::async_trait;

    fn make_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    /// Replays a fixed sequence of assistant messages.
    struct ScriptedLlm {
        script: Mutex<Vec<Message>>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Message>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedLlm {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> std::result::Result<Message, LLMError> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(LLMError::Api("script exhausted".to_string()));
            }
            Ok(script.remove(0))
        }
    }

    /// Always requests another tool call, never terminates.
    struct RelentlessLlm;

    #[async_trait]
    impl LLMProvider for RelentlessLlm {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> std::result::Result<Message, LLMError> {
            Ok(Message::assistant(
                "",
                Some(vec![make_call(
                    "call_again",
                    "add_two_numbers",
                    r#"{"a": 1, "b": 1}"#,
                )]),
            ))
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LLMProvider for FailingLlm {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> std::result::Result<Message, LLMError> {
            Err(LLMError::Api("rate limited".to_string()))
        }
    }

    fn local_tools() -> Arc<dyn ToolExecutor> {
        let registry = ToolRegistry::new();
        registry.register(AddTwoNumbersTool::new()).unwrap();
        Arc::new(BuiltinToolExecutor::with_registry(registry))
    }

    fn terminal_message(answer: &str) -> Message {
        Message::assistant(
            format!(r#"{{"analysis": "computed", "answer": "{answer}"}}"#),
            None,
        )
    }

    #[test]
    fn routing_is_pure_over_the_latest_message() {
        let with_calls = Message::assistant("", Some(vec![make_call("c1", "t", "{}")]));
        assert_eq!(route_after_model_turn(&with_calls), Route::ToolExec);

        let without_calls = Message::assistant("done", None);
        assert_eq!(route_after_model_turn(&without_calls), Route::End);

        // Non-assistant roles never route to tool execution.
        assert_eq!(
            route_after_model_turn(&Message::user("hello")),
            Route::End
        );
    }

    #[tokio::test]
    async fn single_turn_run_appends_exactly_one_assistant_message() {
        let llm = Arc::new(ScriptedLlm::new(vec![terminal_message("done")]));
        let mut conversation = Conversation::from_user_input("hi");

        let answer = run_agent_loop(
            &mut conversation,
            llm,
            local_tools(),
            CancellationToken::new(),
            &AgentLoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(answer, "done");
        // system + user + one assistant
        assert_eq!(conversation.len(), 3);
    }

    #[tokio::test]
    async fn arithmetic_scenario_runs_tool_then_terminates() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Message::assistant(
                "",
                Some(vec![make_call(
                    "call_add",
                    "add_two_numbers",
                    r#"{"a": 3123123, "b": 5123123}"#,
                )]),
            ),
            terminal_message("The sum is 8246246"),
        ]));
        let mut conversation = Conversation::from_user_input("what's 3123123 + 5123123?");

        let answer = run_agent_loop(
            &mut conversation,
            llm,
            local_tools(),
            CancellationToken::new(),
            &AgentLoopConfig::default(),
        )
        .await
        .unwrap();

        assert!(answer.contains("8246246"));

        let messages = conversation.messages();
        // system + user + assistant(tool call) + tool result + assistant
        assert_eq!(messages.len(), 5);
        let tool_message = &messages[3];
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_add"));
        assert_eq!(tool_message.content, "8246246");
    }

    #[tokio::test]
    async fn tool_exec_appends_one_result_per_pending_invocation() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Message::assistant(
                "",
                Some(vec![
                    make_call("call_1", "add_two_numbers", r#"{"a": 1, "b": 2}"#),
                    make_call("call_2", "add_two_numbers", r#"{"a": 3, "b": 4}"#),
                ]),
            ),
            terminal_message("3 and 7"),
        ]));
        let mut conversation = Conversation::from_user_input("two sums please");

        run_agent_loop(
            &mut conversation,
            llm,
            local_tools(),
            CancellationToken::new(),
            &AgentLoopConfig::default(),
        )
        .await
        .unwrap();

        let tool_ids: Vec<_> = conversation
            .messages()
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(tool_ids.len(), 2);
        assert!(tool_ids.contains(&"call_1"));
        assert!(tool_ids.contains(&"call_2"));
    }

    #[tokio::test]
    async fn unknown_tool_recovers_into_the_conversation() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Message::assistant(
                "",
                Some(vec![make_call("call_x", "no_such_tool", "{}")]),
            ),
            terminal_message("recovered"),
        ]));
        let mut conversation = Conversation::from_user_input("try something");

        let answer = run_agent_loop(
            &mut conversation,
            llm,
            local_tools(),
            CancellationToken::new(),
            &AgentLoopConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(answer, "recovered");
        let failure = conversation
            .messages()
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("call_x"))
            .unwrap();
        assert!(failure.content.contains("Tool call failed"));
        assert!(failure.content.contains("no_such_tool"));
    }

    #[tokio::test]
    async fn model_failure_aborts_the_run() {
        let mut conversation = Conversation::from_user_input("hi");

        let error = run_agent_loop(
            &mut conversation,
            Arc::new(FailingLlm),
            local_tools(),
            CancellationToken::new(),
            &AgentLoopConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AgentError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn relentless_model_is_forced_to_end() {
        let mut conversation = Conversation::from_user_input("loop forever");
        let config = AgentLoopConfig {
            max_turns: 3,
            ..Default::default()
        };

        let answer = run_agent_loop(
            &mut conversation,
            Arc::new(RelentlessLlm),
            local_tools(),
            CancellationToken::new(),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(answer, TURN_LIMIT_ANSWER);
        // system + user + 3 x (assistant + tool result)
        assert_eq!(conversation.len(), 8);
    }

    #[tokio::test]
    async fn malformed_terminal_message_is_an_error_by_default() {
        let llm = Arc::new(ScriptedLlm::new(vec![Message::assistant(
            "just plain prose",
            None,
        )]));
        let mut conversation = Conversation::from_user_input("hi");

        let error = run_agent_loop(
            &mut conversation,
            llm,
            local_tools(),
            CancellationToken::new(),
            &AgentLoopConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AgentError::MalformedAnswer(_)));
    }

    #[tokio::test]
    async fn malformed_terminal_message_can_fall_back_to_raw_text() {
        let llm = Arc::new(ScriptedLlm::new(vec![Message::assistant(
            "just plain prose",
            None,
        )]));
        let mut conversation = Conversation::from_user_input("hi");
        let config = AgentLoopConfig {
            fallback_to_raw_answer: true,
            ..Default::default()
        };

        let answer = run_agent_loop(
            &mut conversation,
            llm,
            local_tools(),
            CancellationToken::new(),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(answer, "just plain prose");
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_run_before_a_model_turn() {
        let token = CancellationToken::new();
        token.cancel();
        let mut conversation = Conversation::from_user_input("hi");

        let error = run_agent_loop(
            &mut conversation,
            Arc::new(RelentlessLlm),
            local_tools(),
            token,
            &AgentLoopConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, AgentError::Cancelled));
    }
}
