//! Change-notification channel.
//!
//! A [`Subscription`] yields [`ChangeEvent`]s for one team's tasks. The HTTP
//! backend feeds it from a Phoenix websocket channel; the memory backend
//! feeds it directly from its write path.

use std::time::Duration;

use allwork_core::change::{ChangeEvent, ChangeKind};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::ServiceError;

/// The realtime server drops sockets that stay silent for 30 seconds.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Live change feed for one board. Dropping it tears the channel down.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            rx,
            task: None,
            closed: false,
        }
    }

    pub fn with_task(rx: mpsc::UnboundedReceiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
            closed: false,
        }
    }

    /// Non-blocking read for the UI tick.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// True once the feed has ended and every queued event has been read.
    /// Only `try_next` notices this.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The channel task exits once its sender sees the receiver closed.
        self.rx.close();
        if let Some(task) = self.task.take() {
            if task.is_finished() {
                return;
            }
            debug!("realtime subscription closed");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhxMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// What an incoming frame means for a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Change(ChangeEvent),
    JoinFailed(String),
    Closed,
    Ignored,
}

pub fn websocket_url(base_url: &str, api_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws}/realtime/v1/websocket?apikey={api_key}&vsn=1.0.0")
}

pub fn channel_topic(team_id: i64) -> String {
    format!("realtime:board-{team_id}")
}

pub fn join_message(team_id: i64, access_token: Option<&str>, reference: &str) -> PhxMessage {
    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [{
                "event": "*",
                "schema": "public",
                "table": "tasks",
                "filter": format!("team_id=eq.{team_id}"),
            }],
        },
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    PhxMessage {
        topic: channel_topic(team_id),
        event: "phx_join".into(),
        payload,
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_message(reference: &str) -> PhxMessage {
    PhxMessage {
        topic: "phoenix".into(),
        event: "heartbeat".into(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn classify(msg: &PhxMessage) -> Frame {
    match msg.event.as_str() {
        "postgres_changes" => {
            let data = &msg.payload["data"];
            let kind = data["type"]
                .as_str()
                .or_else(|| data["eventType"].as_str())
                .and_then(ChangeKind::from_str);
            match kind {
                Some(kind) => Frame::Change(ChangeEvent {
                    table: data["table"].as_str().unwrap_or("tasks").to_string(),
                    kind,
                }),
                None => Frame::Ignored,
            }
        }
        "phx_reply" if msg.payload["status"] == "error" => {
            Frame::JoinFailed(msg.payload["response"].to_string())
        }
        "system" if msg.payload["status"] == "error" => Frame::JoinFailed(
            msg.payload["message"]
                .as_str()
                .unwrap_or("channel error")
                .to_string(),
        ),
        "phx_close" | "phx_error" => Frame::Closed,
        _ => Frame::Ignored,
    }
}

/// Connect, join the channel, and pump change frames into a new
/// [`Subscription`] until either side goes away.
pub async fn open_channel(url: &str, join: PhxMessage) -> Result<Subscription, ServiceError> {
    let (ws, _response) = connect_async(url)
        .await
        .map_err(|e| ServiceError::Internal(format!("realtime connect: {e}")))?;
    let (mut sink, mut stream) = ws.split();

    let join_text = serde_json::to_string(&join)
        .map_err(|e| ServiceError::Internal(format!("realtime join encode: {e}")))?;
    sink.send(Message::Text(join_text))
        .await
        .map_err(|e| ServiceError::Internal(format!("realtime join: {e}")))?;
    debug!("joined {}", join.topic);

    let (tx, rx) = mpsc::unbounded_channel();
    let topic = join.topic;
    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut counter: u64 = 1;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    counter += 1;
                    let text = match serde_json::to_string(&heartbeat_message(&counter.to_string())) {
                        Ok(text) => text,
                        Err(_) => break,
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        warn!("realtime heartbeat failed on {topic}");
                        break;
                    }
                }
                _ = tx.closed() => {
                    let _ = sink.close().await;
                    break;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let msg = match serde_json::from_str::<PhxMessage>(&text) {
                            Ok(msg) => msg,
                            Err(e) => {
                                debug!("ignoring realtime frame: {e}");
                                continue;
                            }
                        };
                        match classify(&msg) {
                            Frame::Change(event) => {
                                debug!("realtime {} on {}", event.kind, event.table);
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Frame::JoinFailed(reason) => {
                                warn!("realtime join on {topic} failed: {reason}");
                                break;
                            }
                            Frame::Closed => break,
                            Frame::Ignored => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("realtime socket error on {topic}: {e}");
                        break;
                    }
                },
            }
        }
    });

    Ok(Subscription::with_task(rx, task))
}
