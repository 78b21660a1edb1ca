//! Authoritative raw message list for one conversation.
//!
//! Owns the ascending-by-id array and every mutation of it: full reloads,
//! backward pagination, and idempotent push appends. Ids are unique and
//! strictly increasing within a space; the store never orders by anything
//! other than id.

use crate::db::CachedConversation;
use crate::message::types::Message;

/// Result of a backward-pagination merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrependOutcome {
    /// How many messages were actually inserted (duplicates skipped).
    pub added: usize,
    /// Id of the message that was oldest before the prepend; the screen
    /// keeps this message fixed relative to the viewport so the scroll
    /// position does not jump.
    pub anchor_id: Option<i64>,
}

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn latest_id(&self) -> Option<i64> {
        self.messages.last().map(|m| m.id)
    }

    pub fn oldest_id(&self) -> Option<i64> {
        self.messages.first().map(|m| m.id)
    }

    /// Instant paint from the persisted snapshot, before the network
    /// confirms freshness.
    pub fn hydrate_from_cache(&mut self, cached: CachedConversation) {
        self.messages = cached.raw_messages;
        self.normalize();
    }

    /// Full reload: the fetched page replaces the raw array wholesale.
    pub fn replace_all(&mut self, page: Vec<Message>) {
        self.messages = page;
        self.normalize();
    }

    /// Merge an older page fetched with `before_id = oldest`. Results are
    /// prepended; anything at or past the current oldest id is skipped.
    pub fn prepend_older(&mut self, page: Vec<Message>) -> PrependOutcome {
        let anchor_id = self.oldest_id();
        let cutoff = anchor_id.unwrap_or(i64::MAX);
        let mut older: Vec<Message> = page.into_iter().filter(|m| m.id < cutoff).collect();
        older.sort_by_key(|m| m.id);
        older.dedup_by_key(|m| m.id);

        let added = older.len();
        if added > 0 {
            older.append(&mut self.messages);
            self.messages = older;
        }
        PrependOutcome { added, anchor_id }
    }

    /// Idempotent append of a pushed message. Fast path compares against the
    /// last known id; otherwise an existing id anywhere drops the frame
    /// silently. Returns whether the store changed.
    pub fn append_pushed(&mut self, message: Message) -> bool {
        match self.latest_id() {
            None => {
                self.messages.push(message);
                true
            }
            Some(last) if message.id == last => false,
            Some(last) if message.id > last => {
                self.messages.push(message);
                true
            }
            Some(_) => {
                // Out-of-order or duplicate delivery; scan before inserting.
                if self.messages.iter().any(|m| m.id == message.id) {
                    return false;
                }
                let idx = self
                    .messages
                    .binary_search_by(|m| m.id.cmp(&message.id))
                    .unwrap_or_else(|idx| idx);
                self.messages.insert(idx, message);
                true
            }
        }
    }

    fn normalize(&mut self) {
        self.messages.sort_by_key(|m| m.id);
        self.messages.dedup_by_key(|m| m.id);
    }
}
