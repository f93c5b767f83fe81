//! Slack assistant: answers `app_mention` events with the agent loop.
//!
//! Each mention posts a placeholder reply immediately, runs one scoped
//! agent session over the thread transcript and rewrites the placeholder
//! with the answer (or a fixed apology; internal errors never reach the
//! channel).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use agent_core::{ToolExecutor, ToolRegistry};
use agent_llm::{EmbeddingProvider, LLMProvider, OpenAIProvider};
use agent_loop::{AgentLoopConfig, AgentSession};
use agent_mcp::McpServerConfig;
use agent_tools::{
    AddTwoNumbersTool, BuiltinToolExecutor, RetrieveRelatedDocsTool, SummarizeThreadTool,
};
use assistant::config::AssistantConfig;
use assistant::transcript::render_thread;
use doc_index::{DocumentStore, SearchIndex};
use slack_gateway::{AppMention, SlackClient, SocketModeClient, UserDirectory};

const PLACEHOLDER_TEXT: &str = "Bot is typing...";
const APOLOGY_TEXT: &str = "Sorry, I encountered an error while processing your request.";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AssistantConfig::from_env()?;
    let slack = SlackClient::new(&config.slack_bot_token);

    let users = load_user_directory(&slack, &config.users_file).await?;

    let llm = Arc::new(
        OpenAIProvider::new(&config.openai_api_key).with_model(&config.model),
    );
    let embeddings: Arc<dyn EmbeddingProvider> = llm.clone();
    let store = Arc::new(
        DocumentStore::open(&config.index_path)
            .with_context(|| format!("cannot open index at {}", config.index_path))?,
    );
    let index = Arc::new(SearchIndex::new(store, embeddings));

    let local_tools = build_local_tools(llm.clone(), index)?;
    let mcp_config = Some(McpServerConfig::new(&config.mcp_url));
    let loop_config = AgentLoopConfig {
        max_turns: config.max_turns,
        ..Default::default()
    };

    let (events_tx, mut events_rx) = mpsc::channel::<AppMention>(32);
    let socket = SocketModeClient::new(slack.clone(), &config.slack_app_token);
    tokio::spawn(async move {
        if let Err(e) = socket.run(events_tx).await {
            error!("Socket Mode stream ended: {}", e);
        }
    });

    info!("Assistant running, waiting for mentions");
    while let Some(mention) = events_rx.recv().await {
        let slack = slack.clone();
        let users = users.clone();
        let llm: Arc<dyn LLMProvider> = llm.clone();
        let local_tools = local_tools.clone();
        let mcp_config = mcp_config.clone();
        let loop_config = loop_config.clone();

        tokio::spawn(async move {
            handle_mention(slack, users, llm, local_tools, mcp_config, loop_config, mention)
                .await;
        });
    }

    Ok(())
}

async fn load_user_directory(slack: &SlackClient, users_file: &str) -> Result<UserDirectory> {
    match UserDirectory::from_file(users_file) {
        Ok(directory) if !directory.is_empty() => {
            info!("Loaded user directory from {}", users_file);
            Ok(directory)
        }
        _ => {
            info!("No usable {}, fetching the directory from Slack", users_file);
            let names = slack.user_directory().await?;
            Ok(UserDirectory::new(names))
        }
    }
}

fn build_local_tools(
    llm: Arc<dyn LLMProvider>,
    index: Arc<SearchIndex>,
) -> Result<Arc<dyn ToolExecutor>> {
    let registry = ToolRegistry::new();
    registry.register(AddTwoNumbersTool::new())?;
    registry.register(RetrieveRelatedDocsTool::new(index))?;
    registry.register(SummarizeThreadTool::new(llm))?;
    Ok(Arc::new(BuiltinToolExecutor::with_registry(registry)))
}

/// One mention end to end. Nothing here returns an error: every failure
/// path ends in the apology text so the thread is never left hanging on
/// the placeholder.
async fn handle_mention(
    slack: SlackClient,
    users: UserDirectory,
    llm: Arc<dyn LLMProvider>,
    local_tools: Arc<dyn ToolExecutor>,
    mcp_config: Option<McpServerConfig>,
    loop_config: AgentLoopConfig,
    mention: AppMention,
) {
    let thread_ts = mention.thread_anchor().to_string();
    info!(channel = %mention.channel, thread = %thread_ts, "Handling mention");

    let placeholder = match slack
        .post_message(&mention.channel, Some(&thread_ts), PLACEHOLDER_TEXT)
        .await
    {
        Ok(ts) => ts,
        Err(e) => {
            error!("Cannot post placeholder reply: {}", e);
            return;
        }
    };

    let answer = match answer_mention(&slack, &users, llm, local_tools, mcp_config, &loop_config, &mention)
        .await
    {
        Ok(answer) => answer,
        Err(e) => {
            error!("Mention handling failed: {}", e);
            APOLOGY_TEXT.to_string()
        }
    };

    if let Err(e) = slack
        .update_message(&mention.channel, &placeholder, &answer)
        .await
    {
        error!("Cannot update placeholder with the answer: {}", e);
    }
}

async fn answer_mention(
    slack: &SlackClient,
    users: &UserDirectory,
    llm: Arc<dyn LLMProvider>,
    local_tools: Arc<dyn ToolExecutor>,
    mcp_config: Option<McpServerConfig>,
    loop_config: &AgentLoopConfig,
    mention: &AppMention,
) -> Result<String> {
    let thread_ts = mention.thread_anchor();
    let mut thread = slack.thread_replies(&mention.channel, thread_ts).await?;
    if thread.is_empty() {
        // Mentions outside any thread still carry their own text.
        warn!("Empty thread history, falling back to the mention text");
        thread = vec![serde_json::from_value(serde_json::json!({
            "user": mention.user,
            "text": mention.text,
            "ts": mention.ts,
        }))?];
    }

    let transcript = render_thread(&thread, users);
    let prompt = format!("Conversation thread:\n{transcript}");

    let session = AgentSession::open(llm, local_tools, mcp_config, loop_config.clone()).await?;
    let result = session.run_input(prompt).await;
    session.close().await;

    Ok(result?)
}
