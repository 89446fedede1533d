//! Typed roomchat messages.
//!
//! Outgoing requests are [`ClientCommand`] variants; incoming envelopes are
//! lifted into [`ServerEvent`] with a catch-all for names we do not know.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::Envelope;

/// Wire event names.
pub mod events {
    pub const JOIN: &str = "join";
    pub const BROADCAST: &str = "broadcast";
    pub const PRIVATE_MESSAGE: &str = "privateMessage";
    pub const WELCOME: &str = "welcome";
    pub const MESSAGE: &str = "message";
    pub const ERROR: &str = "error";
}

// ── Outgoing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: String,
    pub auth_token: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub message: String,
    pub auth_token: String,
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessageRequest {
    pub target_id: String,
    pub message: String,
    pub auth_token: String,
}

/// A message the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Join(JoinRequest),
    Broadcast(BroadcastRequest),
    PrivateMessage(PrivateMessageRequest),
}

impl ClientCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Join(_) => events::JOIN,
            Self::Broadcast(_) => events::BROADCAST,
            Self::PrivateMessage(_) => events::PRIVATE_MESSAGE,
        }
    }
}

// ── Incoming ─────────────────────────────────────────────────────────

/// `welcome`: the server's session-establishment message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Welcome {
    pub id: String,
    pub message: String,
}

/// `message`: a room broadcast. `timestamp` is epoch milliseconds, UTC.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BroadcastMessage {
    pub from: String,
    pub username: String,
    pub message: String,
    pub id: String,
    pub timestamp: i64,
}

/// `privateMessage`: a direct message from another client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrivateMessage {
    pub from: String,
    pub username: String,
    pub message: String,
}

/// A message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Welcome(Welcome),
    Message(BroadcastMessage),
    PrivateMessage(PrivateMessage),
    /// Server-reported error; payload carried verbatim.
    Error(Value),
    Unknown {
        event: String,
        payload: Option<Value>,
    },
}

impl ServerEvent {
    /// Lift a decoded envelope into a typed event.
    ///
    /// Missing or mistyped fields become empty strings (timestamps become 0)
    /// so one bad field never discards the whole message.
    pub fn from_envelope(envelope: Envelope) -> Self {
        let p = envelope.payload.as_ref();
        match envelope.event.as_str() {
            events::WELCOME => Self::Welcome(Welcome {
                id: field_text(p, "id"),
                message: field_text(p, "message"),
            }),
            events::MESSAGE => Self::Message(BroadcastMessage {
                from: field_text(p, "from"),
                username: field_text(p, "username"),
                message: field_text(p, "message"),
                id: field_text(p, "id"),
                timestamp: field_millis(p, "timestamp"),
            }),
            events::PRIVATE_MESSAGE => Self::PrivateMessage(PrivateMessage {
                from: field_text(p, "from"),
                username: field_text(p, "username"),
                message: field_text(p, "message"),
            }),
            events::ERROR => Self::Error(envelope.payload.unwrap_or(Value::Null)),
            _ => Self::Unknown {
                event: envelope.event,
                payload: envelope.payload,
            },
        }
    }

    pub fn event_name(&self) -> &str {
        match self {
            Self::Welcome(_) => events::WELCOME,
            Self::Message(_) => events::MESSAGE,
            Self::PrivateMessage(_) => events::PRIVATE_MESSAGE,
            Self::Error(_) => events::ERROR,
            Self::Unknown { event, .. } => event,
        }
    }
}

/// Plain text form of a JSON value: strings unquoted, null empty, anything
/// else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn field_text(payload: Option<&Value>, key: &str) -> String {
    payload
        .and_then(|p| p.get(key))
        .map(value_text)
        .unwrap_or_default()
}

fn field_millis(payload: Option<&Value>, key: &str) -> i64 {
    match payload.and_then(|p| p.get(key)) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
