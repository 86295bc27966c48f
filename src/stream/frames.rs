//! SSE wire framing
//!
//! Frames are one-directional server-to-client text blocks:
//! `event: <name>\ndata: <json>\n\n` for named events and `: <text>\n\n`
//! for comment heartbeats, which carry no event name and exist only to keep
//! intermediaries from timing out the connection.

use axum::response::sse::Event;
use chrono::Utc;
use serde_json::{json, Value};

use crate::models::Notification;

/// A single frame on a client stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A named event with a JSON payload
    Event { name: String, data: Value },
    /// A comment line, invisible to EventSource consumers
    Comment(String),
}

impl StreamFrame {
    /// The frame sent once, immediately on attach
    pub fn connected(client_id: &str) -> Self {
        StreamFrame::Event {
            name: "connected".to_string(),
            data: json!({
                "clientId": client_id,
                "timestamp": Utc::now(),
            }),
        }
    }

    /// A notification delivery frame
    pub fn notification(data: Value) -> Self {
        StreamFrame::Event {
            name: "notification".to_string(),
            data,
        }
    }

    /// The periodic keep-alive frame
    pub fn heartbeat() -> Self {
        StreamFrame::Comment("heartbeat".to_string())
    }

    /// Encode to the raw SSE wire format
    pub fn encode(&self) -> String {
        match self {
            StreamFrame::Event { name, data } => {
                let payload = serde_json::to_string(data).unwrap_or_else(|_| "null".to_string());
                format!("event: {}\ndata: {}\n\n", name, payload)
            }
            StreamFrame::Comment(text) => format!(": {}\n\n", text),
        }
    }

    /// Convert into an axum SSE event
    pub fn into_sse_event(self) -> Event {
        match self {
            StreamFrame::Event { name, data } => {
                let payload = serde_json::to_string(&data).unwrap_or_else(|_| "null".to_string());
                Event::default().event(name).data(payload)
            }
            StreamFrame::Comment(text) => Event::default().comment(text),
        }
    }
}

impl From<&Notification> for StreamFrame {
    fn from(notification: &Notification) -> Self {
        StreamFrame::notification(
            serde_json::to_value(notification).unwrap_or_else(|_| Value::Null),
        )
    }
}
