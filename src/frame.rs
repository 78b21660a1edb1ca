//! Push-channel frame shapes.
//!
//! Two shapes share the channel: event frames carrying an `event`
//! discriminator, and bare message frames with no `event` key. Inbound
//! payloads parse into the closed `PushFrame` union and are dispatched by
//! exhaustive match; anything unparsable is a `MalformedFrame` error the
//! handler drops without touching state.

use serde::Deserialize;
use serde_json::json;

use crate::message::types::{Message, MessageCreate};
use crate::shared::ChatError;

/// Inbound frames delivered by the push channel.
#[derive(Clone, Debug, PartialEq)]
pub enum PushFrame {
    /// Full snapshot of who is online; replaces, never merges.
    Presence { online_user_ids: Vec<String> },
    /// A user started (`true`) or stopped (`false`) composing.
    Typing { user_id: String, typing: bool },
    /// Another user's read pointer moved.
    ReadUpdate {
        user_id: String,
        last_read_message_id: i64,
    },
    /// A bare message frame (no `event` key).
    Message(Message),
}

#[derive(Deserialize)]
struct PresenceBody {
    #[serde(default)]
    online_user_ids: Vec<String>,
}

#[derive(Deserialize)]
struct TypingBody {
    user_id: String,
    typing: bool,
}

#[derive(Deserialize)]
struct ReadUpdateBody {
    user_id: String,
    last_read_message_id: i64,
}

impl PushFrame {
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ChatError::MalformedFrame(format!("not json: {}", e)))?;

        match value.get("event").and_then(|v| v.as_str()) {
            Some("presence") => {
                let body: PresenceBody = serde_json::from_value(value)
                    .map_err(|e| ChatError::MalformedFrame(format!("bad presence frame: {}", e)))?;
                Ok(PushFrame::Presence {
                    online_user_ids: body.online_user_ids,
                })
            }
            Some("typing") => {
                let body: TypingBody = serde_json::from_value(value)
                    .map_err(|e| ChatError::MalformedFrame(format!("bad typing frame: {}", e)))?;
                Ok(PushFrame::Typing {
                    user_id: body.user_id,
                    typing: body.typing,
                })
            }
            Some("read_update") => {
                let body: ReadUpdateBody = serde_json::from_value(value).map_err(|e| {
                    ChatError::MalformedFrame(format!("bad read_update frame: {}", e))
                })?;
                Ok(PushFrame::ReadUpdate {
                    user_id: body.user_id,
                    last_read_message_id: body.last_read_message_id,
                })
            }
            Some(other) => Err(ChatError::MalformedFrame(format!(
                "unknown event '{}'",
                other
            ))),
            None => serde_json::from_value::<Message>(value)
                .map(PushFrame::Message)
                .map_err(|e| ChatError::MalformedFrame(format!("bad message frame: {}", e))),
        }
    }
}

/// Frames the client writes to the push channel.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundFrame {
    /// Announced immediately after every successful handshake.
    PresenceAnnounce { user_id: String },
    Typing { user_id: String, typing: bool },
    Read {
        user_id: String,
        last_read_message_id: i64,
    },
    /// Bare message create, same shape the REST fallback posts.
    Message(MessageCreate),
}

impl OutboundFrame {
    pub fn to_json(&self) -> String {
        match self {
            OutboundFrame::PresenceAnnounce { user_id } => {
                json!({ "event": "presence", "user_id": user_id }).to_string()
            }
            OutboundFrame::Typing { user_id, typing } => {
                json!({ "event": "typing", "user_id": user_id, "typing": typing }).to_string()
            }
            OutboundFrame::Read {
                user_id,
                last_read_message_id,
            } => json!({
                "event": "read",
                "user_id": user_id,
                "last_read_message_id": last_read_message_id
            })
            .to_string(),
            OutboundFrame::Message(create) => {
                serde_json::to_value(create).unwrap_or_default().to_string()
            }
        }
    }
}
