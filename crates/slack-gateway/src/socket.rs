//! Socket Mode event stream.
//!
//! Dials the WebSocket URL handed out by `apps.connections.open`, acks
//! every envelope and forwards `app_mention` events to the caller. Slack
//! rotates connections with `disconnect` envelopes, so the run loop
//! reconnects until the caller drops the receiving end.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::client::SlackClient;
use crate::error::Result;
use crate::types::AppMention;

const RECONNECT_DELAY_SECS: u64 = 3;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<EnvelopePayload>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopePayload {
    #[serde(default)]
    event: Option<serde_json::Value>,
}

/// What to do after processing one envelope.
enum Dispatch {
    Continue,
    Reconnect,
    Mention(AppMention),
}

pub struct SocketModeClient {
    client: SlackClient,
    app_token: String,
}

impl SocketModeClient {
    pub fn new(client: SlackClient, app_token: impl Into<String>) -> Self {
        Self {
            client,
            app_token: app_token.into(),
        }
    }

    /// Runs the event stream until the receiver side of `events` is
    /// dropped. Each connection lives until Slack asks for a refresh.
    pub async fn run(&self, events: mpsc::Sender<AppMention>) -> Result<()> {
        loop {
            match self.run_connection(&events).await {
                Ok(ConnectionEnd::ReceiverDropped) => {
                    info!("Event consumer gone, stopping Socket Mode");
                    return Ok(());
                }
                Ok(ConnectionEnd::Refresh) => {
                    debug!("Connection refresh requested, reconnecting");
                }
                Err(e) => {
                    warn!("Socket Mode connection failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(RECONNECT_DELAY_SECS))
                        .await;
                }
            }
        }
    }

    async fn run_connection(&self, events: &mpsc::Sender<AppMention>) -> Result<ConnectionEnd> {
        let url = self.client.connections_open(&self.app_token).await?;
        let (stream, _) = connect_async(&url).await?;
        info!("Socket Mode connection established");
        let (mut sink, mut source) = stream.split();

        while let Some(frame) = source.next().await {
            let frame = frame?;
            let text = match frame {
                WsMessage::Text(text) => text,
                WsMessage::Ping(data) => {
                    sink.send(WsMessage::Pong(data)).await?;
                    continue;
                }
                WsMessage::Close(_) => return Ok(ConnectionEnd::Refresh),
                _ => continue,
            };

            let envelope: Envelope = match serde_json::from_str(&text) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!("Unparseable Socket Mode frame: {}", e);
                    continue;
                }
            };

            // Ack before handling; Slack redelivers unacked envelopes.
            if let Some(envelope_id) = &envelope.envelope_id {
                let ack = json!({ "envelope_id": envelope_id }).to_string();
                sink.send(WsMessage::Text(ack)).await?;
            }

            match dispatch_envelope(envelope) {
                Dispatch::Continue => {}
                Dispatch::Reconnect => return Ok(ConnectionEnd::Refresh),
                Dispatch::Mention(mention) => {
                    if events.send(mention).await.is_err() {
                        return Ok(ConnectionEnd::ReceiverDropped);
                    }
                }
            }
        }

        Ok(ConnectionEnd::Refresh)
    }
}

enum ConnectionEnd {
    Refresh,
    ReceiverDropped,
}

fn dispatch_envelope(envelope: Envelope) -> Dispatch {
    match envelope.envelope_type.as_str() {
        "hello" => {
            debug!("Socket Mode hello received");
            Dispatch::Continue
        }
        "disconnect" => {
            debug!(
                "Disconnect requested: {}",
                envelope.reason.as_deref().unwrap_or("unspecified")
            );
            Dispatch::Reconnect
        }
        "events_api" => match extract_mention(envelope.payload) {
            Some(mention) => Dispatch::Mention(mention),
            None => Dispatch::Continue,
        },
        other => {
            debug!("Ignoring Socket Mode envelope type '{}'", other);
            Dispatch::Continue
        }
    }
}

fn extract_mention(payload: Option<EnvelopePayload>) -> Option<AppMention> {
    let event = payload?.event?;
    if event.get("type").and_then(|t| t.as_str()) != Some("app_mention") {
        return None;
    }
    match serde_json::from_value::<AppMention>(event) {
        Ok(mention) => Some(mention),
        Err(e) => {
            warn!("Malformed app_mention event: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> Envelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn hello_and_unknown_types_are_ignored() {
        assert!(matches!(
            dispatch_envelope(envelope(r#"{"type": "hello"}"#)),
            Dispatch::Continue
        ));
        assert!(matches!(
            dispatch_envelope(envelope(r#"{"type": "interactive", "envelope_id": "e1"}"#)),
            Dispatch::Continue
        ));
    }

    #[test]
    fn disconnect_requests_a_reconnect() {
        let result = dispatch_envelope(envelope(
            r#"{"type": "disconnect", "reason": "refresh_requested"}"#,
        ));
        assert!(matches!(result, Dispatch::Reconnect));
    }

    #[test]
    fn app_mention_events_are_forwarded() {
        let result = dispatch_envelope(envelope(
            r#"{
                "type": "events_api",
                "envelope_id": "e1",
                "payload": {
                    "event": {
                        "type": "app_mention",
                        "channel": "C1",
                        "user": "U1",
                        "text": "<@BOT> what's up?",
                        "ts": "1700000000.000100",
                        "thread_ts": "1700000000.000001"
                    }
                }
            }"#,
        ));

        let Dispatch::Mention(mention) = result else {
            panic!("expected a mention");
        };
        assert_eq!(mention.channel, "C1");
        assert_eq!(mention.thread_anchor(), "1700000000.000001");
    }

    #[test]
    fn non_mention_events_are_dropped() {
        let result = dispatch_envelope(envelope(
            r#"{
                "type": "events_api",
                "envelope_id": "e2",
                "payload": {"event": {"type": "message", "channel": "C1", "ts": "1.0"}}
            }"#,
        ));
        assert!(matches!(result, Dispatch::Continue));
    }
}
