//! Online-set tracking for the active space.
//!
//! Each presence snapshot fully overwrites the online set; there is no
//! client-side heartbeat or staleness logic. Staleness is the server's
//! responsibility.

use std::collections::HashSet;

use serde::Serialize;

use crate::session::Session;

/// One row of the displayable online list.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PresenceEntry {
    pub user_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: HashSet<String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace, not merge: the snapshot is the whole truth.
    pub fn apply_snapshot(&mut self, online_user_ids: Vec<String>) {
        self.online = online_user_ids.into_iter().collect();
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Online set joined against the space roster, with the display-name
    /// fallback chain, sorted for stable rendering.
    pub fn display_list(&self, session: &Session) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = self
            .online
            .iter()
            .map(|user_id| PresenceEntry {
                user_id: user_id.clone(),
                display_name: crate::message::view::display_name(None, user_id, session),
                avatar_url: session.avatar_of(user_id).map(str::to_owned),
            })
            .collect();
        entries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SpaceMember;

    #[test]
    fn snapshot_replaces_instead_of_merging() {
        let mut tracker = PresenceTracker::new();
        tracker.apply_snapshot(vec!["a".into(), "b".into()]);
        assert!(tracker.is_online("a"));

        tracker.apply_snapshot(vec!["c".into()]);
        assert!(!tracker.is_online("a"));
        assert!(!tracker.is_online("b"));
        assert!(tracker.is_online("c"));
        assert_eq!(tracker.online_count(), 1);
    }

    #[test]
    fn display_list_joins_roster() {
        let mut session = Session::new("me", 1);
        session.set_roster(vec![SpaceMember {
            user_id: "u2".into(),
            alias: Some("Lin".into()),
            avatar_url: Some("https://cdn.example/lin.png".into()),
        }]);

        let mut tracker = PresenceTracker::new();
        tracker.apply_snapshot(vec!["u2".into(), "u9".into()]);

        let list = tracker.display_list(&session);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Lin");
        assert_eq!(list[0].avatar_url.as_deref(), Some("https://cdn.example/lin.png"));
        // No roster entry: falls back to the raw user id.
        assert_eq!(list[1].display_name, "u9");
        assert_eq!(list[1].avatar_url, None);
    }
}
