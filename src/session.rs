//! Per-app session context.
//!
//! Constructed once at app start and passed by reference to each screen
//! controller; nothing in the engine reaches for process-global state.

use serde::{Deserialize, Serialize};

/// A member of the active space's roster, with denormalized display fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpaceMember {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Viewer identity plus the roster of the space they are in.
#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: String,
    pub space_id: i64,
    roster: Vec<SpaceMember>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, space_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            space_id,
            roster: Vec::new(),
        }
    }

    /// Replace the roster wholesale (refreshed by the space screen, not here).
    pub fn set_roster(&mut self, members: Vec<SpaceMember>) {
        self.roster = members;
    }

    pub fn roster(&self) -> &[SpaceMember] {
        &self.roster
    }

    pub fn member(&self, user_id: &str) -> Option<&SpaceMember> {
        self.roster.iter().find(|m| m.user_id == user_id)
    }

    /// Roster-level alias lookup, used when a message carries no alias.
    pub fn alias_of(&self, user_id: &str) -> Option<&str> {
        self.member(user_id).and_then(|m| m.alias.as_deref())
    }

    pub fn avatar_of(&self, user_id: &str) -> Option<&str> {
        self.member(user_id).and_then(|m| m.avatar_url.as_deref())
    }

    pub fn is_me(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_lookup() {
        let mut session = Session::new("me", 7);
        session.set_roster(vec![SpaceMember {
            user_id: "u2".into(),
            alias: Some("Lin".into()),
            avatar_url: None,
        }]);
        assert_eq!(session.alias_of("u2"), Some("Lin"));
        assert_eq!(session.alias_of("u3"), None);
        assert!(session.is_me("me"));
    }
}
