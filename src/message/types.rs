//! Message types and wire data structures.
//!
//! This module contains:
//! - `Message`: the raw server-assigned message shape
//! - `MessageCreate`: the outbound create payload (socket and REST share it)
//! - `Reader`: one entry of the per-space read-receipt roster

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Audio,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

/// A raw message as stored and synchronized.
///
/// `id` is server-assigned and strictly increasing per space; it is both the
/// sort key and the pagination cursor. The store never orders by anything
/// else.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub space_id: i64,
    pub user_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Media duration in milliseconds (audio only).
    #[serde(rename = "media_duration", skip_serializing_if = "Option::is_none")]
    pub media_duration_ms: Option<i64>,
    /// RFC 3339 timestamp as sent by the server.
    #[serde(default)]
    pub created_at: String,
    /// Denormalized sender display fields (per-space alias table).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    // Reply block, present when this message replies to another.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_avatar: Option<String>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            id: 0,
            space_id: 0,
            user_id: String::new(),
            content: String::new(),
            message_type: MessageType::Text,
            media_url: None,
            media_duration_ms: None,
            created_at: String::new(),
            alias: None,
            avatar_url: None,
            reply_to_id: None,
            reply_to_user_id: None,
            reply_to_content: None,
            reply_to_type: None,
            reply_to_alias: None,
            reply_to_avatar: None,
        }
    }
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }
}

/// Outbound create payload. The socket path sends it bare; the REST fallback
/// sends the identical shape plus `space_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct MessageCreate {
    pub user_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(rename = "media_duration", skip_serializing_if = "Option::is_none")]
    pub media_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<i64>,
}

impl MessageCreate {
    pub fn text(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to_id = Some(message_id);
        self
    }

    pub fn with_space(mut self, space_id: i64) -> Self {
        self.space_id = Some(space_id);
        self
    }
}

/// One entry of `GET readers`: a user's last-read pointer in this space.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Reader {
    pub user_id: String,
    pub last_read_message_id: i64,
}
