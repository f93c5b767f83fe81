use anyhow::{bail, Context, Result};

/// Runtime configuration, environment-first.
///
/// Required variables fail fast at startup; everything else has a default
/// matching a single-channel deployment.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub slack_bot_token: String,
    pub slack_app_token: String,
    pub openai_api_key: String,
    /// SSE endpoint of the remote tool provider.
    pub mcp_url: String,
    pub model: String,
    pub max_turns: usize,
    pub channel_name: String,
    pub index_path: String,
    pub users_file: String,
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self> {
        let slack_bot_token = required("SLACK_BOT_TOKEN")?;
        let slack_app_token = required("SLACK_APP_TOKEN")?;
        let openai_api_key = required("OPENAI_API_KEY")?;

        let max_turns = match std::env::var("AGENT_MAX_TURNS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("AGENT_MAX_TURNS is not a number: {raw}"))?,
            Err(_) => 10,
        };

        Ok(Self {
            slack_bot_token,
            slack_app_token,
            openai_api_key,
            mcp_url: required("MCP_URL")?,
            model: optional("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            max_turns,
            channel_name: optional("SLACK_CHANNEL").unwrap_or_else(|| "social".to_string()),
            index_path: optional("DOC_INDEX_PATH").unwrap_or_else(|| "doc_index.db".to_string()),
            users_file: optional("USERS_FILE").unwrap_or_else(|| "users.json".to_string()),
        })
    }

    /// Checkpoint file for the configured channel's ingestion runs.
    pub fn checkpoint_path(&self) -> String {
        format!("last_processed_{}.json", self.channel_name)
    }
}

/// Ingestion needs the Web API and the model key but no Socket Mode token.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub slack_bot_token: String,
    pub openai_api_key: String,
    pub channel_name: String,
    pub index_path: String,
    pub users_file: String,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            slack_bot_token: required("SLACK_BOT_TOKEN")?,
            openai_api_key: required("OPENAI_API_KEY")?,
            channel_name: optional("SLACK_CHANNEL").unwrap_or_else(|| "social".to_string()),
            index_path: optional("DOC_INDEX_PATH").unwrap_or_else(|| "doc_index.db".to_string()),
            users_file: optional("USERS_FILE").unwrap_or_else(|| "users.json".to_string()),
        })
    }

    pub fn checkpoint_path(&self) -> String {
        format!("last_processed_{}.json", self.channel_name)
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{name} must be set in the environment"),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
