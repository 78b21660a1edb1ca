//! Read-receipt tracking.
//!
//! The viewer's own pointer is persisted per space and only ever moves
//! forward. The remote map (user → last read id) is refreshed in full on
//! conversation open and merged on push with a monotonic rule: an entry is
//! overwritten only by a greater value, so out-of-order delivery of stale
//! pointers is a no-op.

use std::collections::HashMap;

use crate::message::types::{Message, Reader};

#[derive(Debug, Default)]
pub struct ReadReceiptTracker {
    last_read: i64,
    readers: HashMap<String, i64>,
}

impl ReadReceiptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted pointer at session start.
    pub fn hydrate(&mut self, last_read: Option<i64>) {
        if let Some(id) = last_read {
            self.last_read = self.last_read.max(id);
        }
    }

    pub fn last_read(&self) -> i64 {
        self.last_read
    }

    /// Advance the viewer's pointer. Forward only; returns whether it moved.
    pub fn advance_local(&mut self, message_id: i64) -> bool {
        if message_id > self.last_read {
            self.last_read = message_id;
            true
        } else {
            false
        }
    }

    /// Full refresh from `GET readers` on conversation open.
    pub fn replace_readers(&mut self, readers: Vec<Reader>) {
        self.readers = readers
            .into_iter()
            .map(|r| (r.user_id, r.last_read_message_id))
            .collect();
    }

    /// Monotonic merge of a pushed `read_update`. Returns whether the map
    /// changed.
    pub fn merge_remote(&mut self, user_id: &str, last_read_message_id: i64) -> bool {
        match self.readers.get_mut(user_id) {
            Some(existing) => {
                if last_read_message_id > *existing {
                    *existing = last_read_message_id;
                    true
                } else {
                    false
                }
            }
            None => {
                self.readers
                    .insert(user_id.to_owned(), last_read_message_id);
                true
            }
        }
    }

    pub fn readers(&self) -> &HashMap<String, i64> {
        &self.readers
    }
}

/// Id of the first message newer than the viewer's pointer, or `None` when
/// everything is read. Renders the one-time "new messages" boundary.
pub fn compute_unread_divider(messages: &[Message], last_read: i64) -> Option<i64> {
    messages
        .iter()
        .map(|m| m.id)
        .filter(|id| *id > last_read)
        .min()
}

/// Count of readers, excluding the viewer, whose pointer is at or past
/// `message_id`.
pub fn compute_read_count(
    message_id: i64,
    readers: &HashMap<String, i64>,
    viewer_id: &str,
) -> usize {
    readers
        .iter()
        .filter(|(user_id, last_read)| user_id.as_str() != viewer_id && **last_read >= message_id)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64) -> Message {
        Message {
            id,
            user_id: "u1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn local_pointer_is_monotonic() {
        let mut tracker = ReadReceiptTracker::new();
        assert!(tracker.advance_local(10));
        assert!(!tracker.advance_local(5));
        assert!(!tracker.advance_local(10));
        assert_eq!(tracker.last_read(), 10);
        assert!(tracker.advance_local(12));
        assert_eq!(tracker.last_read(), 12);
    }

    #[test]
    fn remote_merge_ignores_out_of_order_regressions() {
        let mut tracker = ReadReceiptTracker::new();
        assert!(tracker.merge_remote("u2", 30));
        // A stale update delivered late must not regress the entry.
        assert!(!tracker.merge_remote("u2", 20));
        assert_eq!(tracker.readers().get("u2"), Some(&30));
        assert!(tracker.merge_remote("u2", 41));
        assert_eq!(tracker.readers().get("u2"), Some(&41));
    }

    #[test]
    fn divider_is_smallest_unread_id() {
        let messages: Vec<Message> = [4, 7, 9].into_iter().map(message).collect();
        assert_eq!(compute_unread_divider(&messages, 0), Some(4));
        assert_eq!(compute_unread_divider(&messages, 4), Some(7));
        assert_eq!(compute_unread_divider(&messages, 8), Some(9));
        // lastRead >= max(id): everything read, no divider.
        assert_eq!(compute_unread_divider(&messages, 9), None);
        assert_eq!(compute_unread_divider(&messages, 50), None);
        assert_eq!(compute_unread_divider(&[], 0), None);
    }

    #[test]
    fn read_count_excludes_viewer() {
        let mut readers = HashMap::new();
        readers.insert("me".to_string(), 100);
        readers.insert("u2".to_string(), 40);
        readers.insert("u3".to_string(), 60);
        readers.insert("u4".to_string(), 39);

        assert_eq!(compute_read_count(40, &readers, "me"), 2);
        assert_eq!(compute_read_count(60, &readers, "me"), 1);
        assert_eq!(compute_read_count(61, &readers, "me"), 0);
    }

    #[test]
    fn hydrate_takes_the_larger_pointer() {
        let mut tracker = ReadReceiptTracker::new();
        tracker.advance_local(8);
        tracker.hydrate(Some(5));
        assert_eq!(tracker.last_read(), 8);
        tracker.hydrate(Some(20));
        assert_eq!(tracker.last_read(), 20);
        tracker.hydrate(None);
        assert_eq!(tracker.last_read(), 20);
    }
}
