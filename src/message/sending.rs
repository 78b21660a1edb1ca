//! Outbound delivery functions.
//!
//! This module handles:
//! - Socket-first message delivery with the silent REST fallback; a push
//!   send counts only once the write is acknowledged, anything else retries
//!   via REST
//! - Read-pointer announces over the same two paths
//! - The compose-box state cleared after a successful send
//!
//! Transport failures never surface to the user; the REST fallback carries
//! the identical payload shape. No idempotency key is attached across the
//! two paths (see DESIGN.md).

use log::debug;

use crate::connection::ConnectionManager;
use crate::frame::OutboundFrame;
use crate::message::types::MessageCreate;
use crate::net::ChatApi;
use crate::shared::ChatError;

/// Which transport actually carried a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryPath {
    Push,
    Rest,
}

/// Compose-box state owned by the open conversation. Cleared in full after
/// either delivery path succeeds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComposeState {
    pub text: String,
    pub reply_to: Option<i64>,
    pub panel_open: bool,
}

impl ComposeState {
    pub fn clear(&mut self) {
        self.text.clear();
        self.reply_to = None;
        self.panel_open = false;
    }
}

/// Deliver a message: push channel first, REST on refusal or a missing
/// write acknowledgement.
pub async fn deliver_message(
    conn: &ConnectionManager,
    api: &ChatApi,
    space_id: i64,
    create: MessageCreate,
) -> Result<DeliveryPath, ChatError> {
    if let Some(ack) = conn.send_acked(&OutboundFrame::Message(create.clone())) {
        if ack.await.unwrap_or(false) {
            return Ok(DeliveryPath::Push);
        }
        debug!("push write was not acknowledged, retrying via REST");
    } else {
        debug!("push channel unavailable, sending via REST");
    }
    api.post_send(&create.with_space(space_id)).await?;
    Ok(DeliveryPath::Rest)
}

/// Announce the viewer's read pointer: push channel first, REST on refusal
/// or a missing write acknowledgement.
pub async fn announce_read(
    conn: &ConnectionManager,
    api: &ChatApi,
    space_id: i64,
    user_id: &str,
    last_read_message_id: i64,
) -> Result<DeliveryPath, ChatError> {
    let frame = OutboundFrame::Read {
        user_id: user_id.to_owned(),
        last_read_message_id,
    };
    if let Some(ack) = conn.send_acked(&frame) {
        if ack.await.unwrap_or(false) {
            return Ok(DeliveryPath::Push);
        }
        debug!("read announce was not acknowledged, retrying via REST");
    } else {
        debug!("push channel unavailable, announcing read via REST");
    }
    api.post_read(space_id, user_id, last_read_message_id)
        .await?;
    Ok(DeliveryPath::Rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_clear_resets_everything() {
        let mut compose = ComposeState {
            text: "draft".into(),
            reply_to: Some(12),
            panel_open: true,
        };
        compose.clear();
        assert_eq!(compose, ComposeState::default());
    }
}
