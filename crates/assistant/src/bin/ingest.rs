//! Channel history ingestion.
//!
//! Walks the configured channel's history newer than the last checkpoint,
//! renders each thread into a dated transcript and indexes it with a
//! permalink back to the source message. Run it on a schedule; the
//! checkpoint keeps repeated runs incremental.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agent_llm::{EmbeddingProvider, OpenAIProvider};
use assistant::config::IngestConfig;
use assistant::transcript::render_thread_dated;
use doc_index::{DocumentMetadata, DocumentStore, IngestCheckpoint, SearchIndex};
use slack_gateway::{SlackClient, SlackMessage, UserDirectory};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = IngestConfig::from_env()?;
    let slack = SlackClient::new(&config.slack_bot_token);
    let channel_id = slack.channel_id_by_name(&config.channel_name).await?;

    let users = match UserDirectory::from_file(&config.users_file) {
        Ok(directory) if !directory.is_empty() => directory,
        _ => UserDirectory::new(slack.user_directory().await?),
    };

    let embeddings: Arc<dyn EmbeddingProvider> =
        Arc::new(OpenAIProvider::new(&config.openai_api_key));
    let store = Arc::new(
        DocumentStore::open(&config.index_path)
            .with_context(|| format!("cannot open index at {}", config.index_path))?,
    );
    let index = SearchIndex::new(store, embeddings);

    let mut checkpoint = IngestCheckpoint::load(config.checkpoint_path());
    info!(
        channel = %config.channel_name,
        since = checkpoint.last_ts(),
        "Starting ingestion"
    );

    let history = slack.channel_history(&channel_id, None).await?;
    let mut indexed_chunks = 0usize;
    let mut skipped = 0usize;

    for message in &history {
        let Ok(message_ts) = message.ts.parse::<f64>() else {
            warn!("Skipping message with unparseable ts '{}'", message.ts);
            continue;
        };
        if message_ts <= checkpoint.last_ts() {
            skipped += 1;
            continue;
        }

        let transcript = match thread_transcript(&slack, &channel_id, message, &users).await {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!("Skipping thread {}: {}", message.ts, e);
                continue;
            }
        };
        if transcript.is_empty() {
            checkpoint.observe(message_ts);
            continue;
        }

        let permalink = match slack.permalink(&channel_id, &message.ts).await {
            Ok(link) => Some(link),
            Err(e) => {
                warn!("No permalink for {}: {}", message.ts, e);
                None
            }
        };

        let metadata = DocumentMetadata {
            permalink,
            channel: Some(config.channel_name.clone()),
            message_ts: Some(message.ts.clone()),
            thread_ts: message.thread_ts.clone(),
            author: message
                .user
                .as_deref()
                .map(|id| users.display_name(id).to_string()),
        };

        indexed_chunks += index.add_transcript(&transcript, metadata).await?;
        checkpoint.observe(message_ts);
    }

    checkpoint.save()?;
    info!(
        chunks = indexed_chunks,
        already_indexed = skipped,
        "Ingestion finished"
    );
    Ok(())
}

/// Dated transcript for one top-level message, replies included when it
/// anchors a thread.
async fn thread_transcript(
    slack: &SlackClient,
    channel_id: &str,
    message: &SlackMessage,
    users: &UserDirectory,
) -> Result<String> {
    if message.thread_ts.is_some() || message.reply_count.unwrap_or(0) > 0 {
        let replies = slack
            .thread_replies(channel_id, message.thread_anchor())
            .await?;
        if !replies.is_empty() {
            return Ok(render_thread_dated(&replies, users));
        }
    }
    Ok(render_thread_dated(std::slice::from_ref(message), users))
}
