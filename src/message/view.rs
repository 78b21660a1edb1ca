//! Pure projection from raw messages to render-ready view models.
//!
//! No state, no side effects: raw message + viewer identity in, view model
//! out. This is the single place where raw store state and the ephemeral
//! trackers combine into what the screen paints, so the UI layer can diff
//! immutable snapshots instead of consuming ad hoc state patches.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDateTime, Utc};
use serde::Serialize;

use crate::config::REPLY_PREVIEW_MAX_CHARS;
use crate::message::types::{Message, MessageType};
use crate::session::Session;
use crate::state::receipts::compute_read_count;

/// Placeholder shown when the replied-to message is an image.
pub const REPLY_PREVIEW_IMAGE: &str = "[image]";
/// Placeholder shown when the replied-to message is a voice clip.
pub const REPLY_PREVIEW_AUDIO: &str = "[voice]";

const ANONYMOUS: &str = "anonymous";

/// Render-ready view of a single message.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MessageView {
    pub id: i64,
    pub is_self: bool,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Whole seconds, rounded; audio only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_duration_secs: Option<i64>,
    pub time_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_preview: Option<ReplyPreview>,
    /// Render the "new messages" boundary above this message.
    pub unread_divider: bool,
    /// "Seen by N", meaningful on the viewer's own messages.
    pub seen_by: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReplyPreview {
    pub display_name: String,
    pub excerpt: String,
}

/// Project one raw message for the given viewer.
pub fn project_message(
    message: &Message,
    session: &Session,
    readers: &HashMap<String, i64>,
    unread_divider: Option<i64>,
    now: DateTime<Utc>,
) -> MessageView {
    let is_self = session.is_me(&message.user_id);
    MessageView {
        id: message.id,
        is_self,
        display_name: display_name(message.alias.as_deref(), &message.user_id, session),
        avatar_url: message
            .avatar_url
            .clone()
            .or_else(|| session.avatar_of(&message.user_id).map(str::to_owned)),
        content: message.content.clone(),
        message_type: message.message_type,
        media_url: message.media_url.clone(),
        media_duration_secs: match message.message_type {
            MessageType::Audio => message.media_duration_ms.map(round_duration_secs),
            _ => None,
        },
        time_label: time_label(&message.created_at, now),
        reply_preview: reply_preview(message, session),
        unread_divider: unread_divider == Some(message.id),
        seen_by: if is_self {
            compute_read_count(message.id, readers, &session.user_id)
        } else {
            0
        },
    }
}

/// Project the whole transcript. Re-run whenever the roster, the read map,
/// or the unread-divider id changes.
pub fn project_all(
    messages: &[Message],
    session: &Session,
    readers: &HashMap<String, i64>,
    unread_divider: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<MessageView> {
    messages
        .iter()
        .map(|m| project_message(m, session, readers, unread_divider, now))
        .collect()
}

/// Display-name fallback chain: message alias → roster alias → user id →
/// "anonymous".
pub fn display_name(alias: Option<&str>, user_id: &str, session: &Session) -> String {
    if let Some(alias) = alias.filter(|a| !a.is_empty()) {
        return alias.to_owned();
    }
    if let Some(alias) = session.alias_of(user_id).filter(|a| !a.is_empty()) {
        return alias.to_owned();
    }
    if !user_id.is_empty() {
        return user_id.to_owned();
    }
    ANONYMOUS.to_owned()
}

/// Bucketed human time label: "HH:MM" if today, "Yesterday HH:MM" if one day
/// prior, else the full date. Unparsable timestamps label as empty.
pub fn time_label(created_at: &str, now: DateTime<Utc>) -> String {
    let Some(at) = parse_timestamp(created_at) else {
        return String::new();
    };
    let today = now.date_naive();
    let date = at.date_naive();
    if date == today {
        at.format("%H:%M").to_string()
    } else if Some(date) == today.checked_sub_days(Days::new(1)) {
        at.format("Yesterday %H:%M").to_string()
    } else {
        at.format("%Y-%m-%d %H:%M").to_string()
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    // Some backends emit naive ISO timestamps; treat those as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn reply_preview(message: &Message, session: &Session) -> Option<ReplyPreview> {
    message.reply_to_id?;
    let reply_user = message.reply_to_user_id.as_deref().unwrap_or("");
    let display = display_name(message.reply_to_alias.as_deref(), reply_user, session);
    let excerpt = match message.reply_to_type.unwrap_or(MessageType::Text) {
        MessageType::Image => REPLY_PREVIEW_IMAGE.to_owned(),
        MessageType::Audio => REPLY_PREVIEW_AUDIO.to_owned(),
        MessageType::Text => truncate_chars(
            message.reply_to_content.as_deref().unwrap_or(""),
            REPLY_PREVIEW_MAX_CHARS,
        ),
    };
    Some(ReplyPreview {
        display_name: display,
        excerpt,
    })
}

/// Character-bounded truncation with an ellipsis, safe on multi-byte text.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut excerpt: String = text.chars().take(max_chars).collect();
    excerpt.push('…');
    excerpt
}

fn round_duration_secs(duration_ms: i64) -> i64 {
    (duration_ms + 500) / 1000
}
