//! Per-conversation orchestration.
//!
//! This module contains:
//! - `ChatController`: routes push frames to the trackers and the store,
//!   drives cache-first loading, pagination, sending, and read advancement
//! - `ConversationView`: the immutable snapshot handed to the screen layer
//!
//! All engine state is owned here and mutated only from these handlers; the
//! caller's event loop feeds channel events and timer firings in, so
//! mutation is serialized without locks. An in-flight history fetch is not
//! ordered relative to push frames; the id-based idempotent merge absorbs
//! the race.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::{
    Endpoints, DEFAULT_PAGE_SIZE, RECONNECT_DELAY, TYPING_DEBOUNCE,
};
use crate::connection::{ChannelEvent, ConnectionManager, LinkState};
use crate::db::Db;
use crate::frame::{OutboundFrame, PushFrame};
use crate::message::sending::{announce_read, deliver_message, ComposeState, DeliveryPath};
use crate::message::types::MessageCreate;
use crate::message::view::{project_all, MessageView};
use crate::net::ChatApi;
use crate::session::Session;
use crate::shared::ChatError;
use crate::state::presence::{PresenceEntry, PresenceTracker};
use crate::state::receipts::{compute_unread_divider, ReadReceiptTracker};
use crate::state::store::{MessageStore, PrependOutcome};
use crate::state::typing::TypingCoordinator;
use crate::timers::{TimerKey, TimerRegistry};

/// Receivers the caller's event loop drains, feeding each item back into
/// `handle_channel_event` / `handle_timer`.
pub struct ChatEvents {
    pub channel: mpsc::UnboundedReceiver<ChannelEvent>,
    pub timers: mpsc::UnboundedReceiver<TimerKey>,
}

/// Immutable render snapshot; the UI layer diffs successive snapshots.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ConversationView {
    pub messages: Vec<MessageView>,
    pub online: Vec<PresenceEntry>,
    /// Display names of members currently composing.
    pub typing: Vec<String>,
    pub has_more: bool,
    pub compose_text: String,
}

pub struct ChatController {
    session: Session,
    api: ChatApi,
    db: Arc<Db>,
    conn: ConnectionManager,
    store: MessageStore,
    presence: PresenceTracker,
    typing: TypingCoordinator,
    receipts: ReadReceiptTracker,
    compose: ComposeState,
    timers: TimerRegistry,
    unread_divider: Option<i64>,
    divider_frozen: bool,
    has_more: bool,
    at_bottom: bool,
}

impl ChatController {
    /// Open a conversation: hydrate the persisted cache and read pointer for
    /// an instant paint, and bring up the push channel. No network happens
    /// here; call [`refresh`](Self::refresh) next.
    pub fn open(
        session: Session,
        endpoints: Endpoints,
        db: Arc<Db>,
    ) -> Result<(Self, ChatEvents), ChatError> {
        let announce = OutboundFrame::PresenceAnnounce {
            user_id: session.user_id.clone(),
        };
        let socket_url = endpoints.chat_socket_url(session.space_id)?.to_string();
        let (conn, channel_rx) = ConnectionManager::connect(socket_url, announce, RECONNECT_DELAY);
        Self::build(session, endpoints, db, conn, channel_rx)
    }

    /// Open without a push channel; every delivery degrades to REST.
    pub fn open_rest_only(
        session: Session,
        endpoints: Endpoints,
        db: Arc<Db>,
    ) -> Result<(Self, ChatEvents), ChatError> {
        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        drop(channel_tx);
        Self::build(
            session,
            endpoints,
            db,
            ConnectionManager::disconnected(),
            channel_rx,
        )
    }

    fn build(
        session: Session,
        endpoints: Endpoints,
        db: Arc<Db>,
        conn: ConnectionManager,
        channel_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Result<(Self, ChatEvents), ChatError> {
        let (timers, timers_rx) = TimerRegistry::new();

        let mut receipts = ReadReceiptTracker::new();
        receipts.hydrate(db.load_read_pointer(session.space_id)?);

        let mut store = MessageStore::new();
        if let Some(cached) = db.load_conversation(session.space_id)? {
            store.hydrate_from_cache(cached);
        }

        let typing = TypingCoordinator::new(session.user_id.clone());
        let mut controller = Self {
            api: ChatApi::new(endpoints),
            session,
            db,
            conn,
            store,
            presence: PresenceTracker::new(),
            typing,
            receipts,
            compose: ComposeState::default(),
            timers,
            unread_divider: None,
            divider_frozen: false,
            has_more: true,
            // Conversations open scrolled to the newest message.
            at_bottom: true,
        };
        controller.freeze_divider();

        Ok((
            controller,
            ChatEvents {
                channel: channel_rx,
                timers: timers_rx,
            },
        ))
    }

    /// Confirm cache freshness against the server and pull the read roster.
    ///
    /// A cheap peek (limit=1) decides whether a full reload is needed; a
    /// matching latest id keeps the cached view and skips the refetch.
    pub async fn refresh(&mut self) -> Result<(), ChatError> {
        let remote_latest = self.api.peek_latest(self.session.space_id).await?;
        if remote_latest != self.store.latest_id() {
            self.reload_latest().await?;
        }

        let readers = self.api.fetch_readers(self.session.space_id).await?;
        self.receipts.replace_readers(readers);

        self.freeze_divider();
        if self.at_bottom {
            self.advance_read().await?;
        }
        Ok(())
    }

    async fn reload_latest(&mut self) -> Result<(), ChatError> {
        let page = self
            .api
            .fetch_history(self.session.space_id, DEFAULT_PAGE_SIZE, None)
            .await?;
        self.has_more = page.has_more;
        self.store.replace_all(page.messages);
        self.persist_cache();
        Ok(())
    }

    /// Backward pagination from the currently-oldest loaded message.
    /// Returns `None` when there is nothing further to load.
    pub async fn load_older(&mut self) -> Result<Option<PrependOutcome>, ChatError> {
        let Some(oldest) = self.store.oldest_id() else {
            return Ok(None);
        };
        if !self.has_more {
            return Ok(None);
        }

        let page = self
            .api
            .fetch_history(self.session.space_id, DEFAULT_PAGE_SIZE, Some(oldest))
            .await?;
        self.has_more = page.has_more;
        let outcome = self.store.prepend_older(page.messages);
        if outcome.added > 0 {
            self.persist_cache();
        }
        Ok(Some(outcome))
    }

    /// Route one push-channel event. Exhaustive over the frame union.
    pub async fn handle_channel_event(&mut self, event: ChannelEvent) -> Result<(), ChatError> {
        match event {
            ChannelEvent::Opened => {
                debug!("push channel open for space {}", self.session.space_id);
            }
            ChannelEvent::Closed => {
                debug!("push channel closed for space {}", self.session.space_id);
                // Remote typing signals are stale once the link drops; the
                // next session starts from explicit signals again.
                self.typing.clear_remote();
            }
            ChannelEvent::Frame(frame) => match frame {
                PushFrame::Presence { online_user_ids } => {
                    self.presence.apply_snapshot(online_user_ids);
                }
                PushFrame::Typing { user_id, typing } => {
                    self.typing.apply_remote(&user_id, typing);
                }
                PushFrame::ReadUpdate {
                    user_id,
                    last_read_message_id,
                } => {
                    self.receipts.merge_remote(&user_id, last_read_message_id);
                }
                PushFrame::Message(message) => {
                    if self.store.append_pushed(message) {
                        self.persist_cache();
                        if self.at_bottom {
                            self.advance_read().await?;
                        }
                    }
                }
            },
        }
        Ok(())
    }

    /// A registry timer fired.
    pub fn handle_timer(&mut self, key: TimerKey) {
        match key {
            TimerKey::TypingStop => self.emit_typing_stop(),
        }
    }

    /// Compose-box change: update the draft, announce typing once per burst,
    /// and re-arm the stop debounce. The debounce stays armed while a start
    /// is outstanding, so clearing the draft still ends in a typing stop.
    pub fn on_compose_change(&mut self, text: &str) {
        self.compose.text = text.to_owned();
        if let Some(frame) = self.typing.on_compose_change(text) {
            // Best effort; typing has no REST path.
            self.conn.send(&frame);
        }
        if self.typing.is_announced() {
            self.timers.arm(TimerKey::TypingStop, TYPING_DEBOUNCE);
        }
    }

    /// Compose box lost focus: typing stops immediately.
    pub fn on_compose_blur(&mut self) {
        self.timers.cancel(TimerKey::TypingStop);
        self.emit_typing_stop();
    }

    pub fn set_reply_target(&mut self, message_id: Option<i64>) {
        self.compose.reply_to = message_id;
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.compose.panel_open = open;
    }

    /// Send the current draft: push channel first, REST fallback. On success
    /// the compose state clears and typing stops; on the REST path the
    /// conversation additionally reloads from history, since no echo frame
    /// will arrive over the socket.
    pub async fn send_message(&mut self) -> Result<(), ChatError> {
        let text = self.compose.text.trim().to_owned();
        if text.is_empty() {
            return Ok(());
        }

        let mut create = MessageCreate::text(self.session.user_id.clone(), text);
        if let Some(reply_to) = self.compose.reply_to {
            create = create.replying_to(reply_to);
        }

        let path = deliver_message(&self.conn, &self.api, self.session.space_id, create).await?;
        self.compose.clear();
        self.timers.cancel(TimerKey::TypingStop);
        self.emit_typing_stop();

        if path == DeliveryPath::Rest {
            self.reload_latest().await?;
            if self.at_bottom {
                self.advance_read().await?;
            }
        }
        Ok(())
    }

    /// The screen reports whether the viewport sits at the bottom of the
    /// transcript; reaching the bottom advances the read pointer.
    pub async fn set_at_bottom(&mut self, at_bottom: bool) -> Result<(), ChatError> {
        self.at_bottom = at_bottom;
        if at_bottom {
            self.advance_read().await?;
        }
        Ok(())
    }

    /// Project everything the screen paints from the current state.
    pub fn view(&self, now: DateTime<Utc>) -> ConversationView {
        ConversationView {
            messages: project_all(
                self.store.messages(),
                &self.session,
                self.receipts.readers(),
                self.unread_divider,
                now,
            ),
            online: self.presence.display_list(&self.session),
            typing: self
                .typing
                .remote_typists()
                .iter()
                .map(|id| crate::message::view::display_name(None, id, &self.session))
                .collect(),
            has_more: self.has_more,
            compose_text: self.compose.text.clone(),
        }
    }

    /// Tear down the conversation: close the socket terminally and cancel
    /// every pending timer.
    pub fn close(&mut self) {
        self.conn.close();
        self.timers.clear();
    }

    pub fn connection_state(&self) -> LinkState {
        self.conn.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn receipts(&self) -> &ReadReceiptTracker {
        &self.receipts
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn typing(&self) -> &TypingCoordinator {
        &self.typing
    }

    pub fn compose(&self) -> &ComposeState {
        &self.compose
    }

    pub fn unread_divider(&self) -> Option<i64> {
        self.unread_divider
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    fn emit_typing_stop(&mut self) {
        if let Some(frame) = self.typing.on_stop() {
            self.conn.send(&frame);
        }
    }

    /// The boundary marker is computed once per conversation open, the first
    /// time messages are available, and never moves afterwards.
    fn freeze_divider(&mut self) {
        if !self.divider_frozen && !self.store.is_empty() {
            self.unread_divider =
                compute_unread_divider(self.store.messages(), self.receipts.last_read());
            self.divider_frozen = true;
        }
    }

    /// Move the viewer's pointer to the newest known message, persist it,
    /// and announce it. A failed announce is transient and only logged; the
    /// pointer itself is already durable.
    async fn advance_read(&mut self) -> Result<(), ChatError> {
        let Some(newest) = self.store.latest_id() else {
            return Ok(());
        };
        if !self.receipts.advance_local(newest) {
            return Ok(());
        }
        self.db.save_read_pointer(self.session.space_id, newest)?;
        if let Err(e) = announce_read(
            &self.conn,
            &self.api,
            self.session.space_id,
            &self.session.user_id,
            newest,
        )
        .await
        {
            warn!("read announce failed: {}", e);
        }
        Ok(())
    }

    fn persist_cache(&self) {
        if let Err(e) = self
            .db
            .save_conversation(self.session.space_id, self.store.messages())
        {
            warn!("conversation cache write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::types::Message;
    use chrono::TimeZone;

    fn endpoints() -> Endpoints {
        // Nothing listens on port 9; REST calls in these tests would fail,
        // and none of the covered paths issue any.
        Endpoints::new("http://127.0.0.1:9", "ws://127.0.0.1:9").unwrap()
    }

    fn message(id: i64, user_id: &str) -> Message {
        Message {
            id,
            user_id: user_id.into(),
            content: format!("m{}", id),
            created_at: "2024-05-02T09:00:00+00:00".into(),
            ..Default::default()
        }
    }

    fn controller_with_cache(messages: &[Message]) -> (ChatController, ChatEvents, Arc<Db>) {
        let db = Arc::new(Db::open_in_memory().unwrap());
        db.save_conversation(7, messages).unwrap();
        let session = Session::new("me", 7);
        let (controller, events) =
            ChatController::open_rest_only(session, endpoints(), Arc::clone(&db)).unwrap();
        (controller, events, db)
    }

    #[tokio::test]
    async fn cache_paints_instantly_and_divider_freezes() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        db.save_conversation(7, &[message(4, "u2"), message(7, "u2"), message(9, "u2")])
            .unwrap();
        db.save_read_pointer(7, 4).unwrap();

        let (controller, _events) =
            ChatController::open_rest_only(Session::new("me", 7), endpoints(), db).unwrap();
        assert_eq!(controller.store().len(), 3);
        // First unread after the persisted pointer.
        assert_eq!(controller.unread_divider(), Some(7));
    }

    #[tokio::test]
    async fn pushed_message_advances_pointer_when_at_bottom() {
        let (mut controller, _events, db) = controller_with_cache(&[message(1, "u2")]);

        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::Message(message(2, "u2"))))
            .await
            .unwrap();

        assert_eq!(controller.store().latest_id(), Some(2));
        assert_eq!(controller.receipts().last_read(), 2);
        assert_eq!(db.load_read_pointer(7).unwrap(), Some(2));
        // Cache was reconciled with the appended message.
        assert_eq!(db.load_conversation(7).unwrap().unwrap().last_id, Some(2));
    }

    #[tokio::test]
    async fn pushed_message_does_not_advance_pointer_when_scrolled_up() {
        let (mut controller, _events, db) = controller_with_cache(&[message(1, "u2")]);
        controller.at_bottom = false;

        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::Message(message(2, "u2"))))
            .await
            .unwrap();
        assert_eq!(controller.receipts().last_read(), 0);
        assert_eq!(db.load_read_pointer(7).unwrap(), None);

        // Scrolling back down catches the pointer up.
        controller.set_at_bottom(true).await.unwrap();
        assert_eq!(controller.receipts().last_read(), 2);
        assert_eq!(db.load_read_pointer(7).unwrap(), Some(2));
    }

    #[tokio::test]
    async fn duplicate_push_leaves_store_and_cache_untouched() {
        let (mut controller, _events, _db) = controller_with_cache(&[message(1, "u2")]);
        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::Message(message(2, "u2"))))
            .await
            .unwrap();
        let before: Vec<i64> = controller.store().messages().iter().map(|m| m.id).collect();

        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::Message(message(2, "u2"))))
            .await
            .unwrap();
        let after: Vec<i64> = controller.store().messages().iter().map(|m| m.id).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn event_frames_route_to_their_trackers() {
        let (mut controller, _events, _db) = controller_with_cache(&[message(1, "u2")]);

        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::Presence {
                online_user_ids: vec!["u2".into(), "u3".into()],
            }))
            .await
            .unwrap();
        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::Typing {
                user_id: "u2".into(),
                typing: true,
            }))
            .await
            .unwrap();
        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::ReadUpdate {
                user_id: "u2".into(),
                last_read_message_id: 1,
            }))
            .await
            .unwrap();

        assert_eq!(controller.presence().online_count(), 2);
        assert_eq!(controller.typing().remote_typists(), vec!["u2".to_string()]);
        assert_eq!(controller.receipts().readers().get("u2"), Some(&1));

        let view = controller.view(Utc.with_ymd_and_hms(2024, 5, 2, 18, 0, 0).unwrap());
        assert_eq!(view.online.len(), 2);
        assert_eq!(view.typing, vec!["u2".to_string()]);
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].seen_by, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_the_draft_still_ends_in_a_typing_stop() {
        let (mut controller, mut events, _db) = controller_with_cache(&[message(1, "u2")]);

        controller.on_compose_change("h");
        // Socket is down, but the local flag still tracks the burst.
        assert!(controller.typing().is_announced());

        // Emptying the draft leaves the debounce armed; the stop must still
        // fire after the silence window.
        controller.on_compose_change("");
        assert!(controller.typing().is_announced());
        let fired = tokio::time::timeout(TYPING_DEBOUNCE * 2, events.timers.recv())
            .await
            .expect("debounce never fired after the draft was cleared")
            .expect("timer channel closed");
        assert_eq!(fired, TimerKey::TypingStop);
        controller.handle_timer(fired);
        assert!(!controller.typing().is_announced());

        // The edge flag reset, so a fresh burst announces again.
        controller.on_compose_change("again");
        assert!(controller.typing().is_announced());
    }

    #[tokio::test]
    async fn blur_stops_typing_immediately() {
        let (mut controller, _events, _db) = controller_with_cache(&[message(1, "u2")]);
        controller.on_compose_change("h");
        assert!(controller.typing().is_announced());

        controller.on_compose_blur();
        assert!(!controller.typing().is_announced());
    }

    #[tokio::test]
    async fn link_close_clears_remote_typists() {
        let (mut controller, _events, _db) = controller_with_cache(&[message(1, "u2")]);
        controller
            .handle_channel_event(ChannelEvent::Frame(PushFrame::Typing {
                user_id: "u2".into(),
                typing: true,
            }))
            .await
            .unwrap();
        assert_eq!(controller.typing().remote_typists(), vec!["u2".to_string()]);

        controller
            .handle_channel_event(ChannelEvent::Closed)
            .await
            .unwrap();
        assert!(controller.typing().remote_typists().is_empty());
    }

    #[tokio::test]
    async fn view_projects_cached_messages() {
        let (controller, _events, _db) = controller_with_cache(&[message(1, "u2"), message(2, "me")]);
        let view = controller.view(Utc.with_ymd_and_hms(2024, 5, 2, 18, 0, 0).unwrap());
        assert_eq!(view.messages.len(), 2);
        assert!(!view.messages[0].is_self);
        assert!(view.messages[1].is_self);
        assert_eq!(view.messages[0].time_label, "09:00");
    }
}
