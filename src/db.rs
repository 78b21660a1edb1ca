//! Device-persisted conversation state.
//!
//! This module handles:
//! - The per-space conversation cache (newest 50 raw messages) read once at
//!   session start for an instant paint before the network confirms freshness
//! - The per-space read pointer, advanced forward only
//!
//! The cache slot is overwritten on every store reconciliation.

use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::MAX_CACHED_MESSAGES;
use crate::message::types::Message;
use crate::shared::{ChatError, ResultExt};

/// Persisted per-space conversation snapshot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CachedConversation {
    pub raw_messages: Vec<Message>,
    pub last_id: Option<i64>,
    /// Unix seconds at the time the snapshot was written.
    pub cached_at: i64,
}

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self, ChatError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, ChatError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), ChatError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversation_cache (
                space_id INTEGER PRIMARY KEY,
                raw_messages TEXT NOT NULL,
                last_id INTEGER,
                cached_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS read_pointer (
                space_id INTEGER PRIMARY KEY,
                last_read_id INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Overwrite the cache slot for a space with the newest messages,
    /// trimmed to the most recent 50.
    pub fn save_conversation(&self, space_id: i64, messages: &[Message]) -> Result<(), ChatError> {
        let start = messages.len().saturating_sub(MAX_CACHED_MESSAGES);
        let trimmed = &messages[start..];
        let payload =
            serde_json::to_string(trimmed).storage_context("cache serialization failed")?;
        let last_id = trimmed.last().map(|m| m.id);
        let cached_at = Utc::now().timestamp();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO conversation_cache (space_id, raw_messages, last_id, cached_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(space_id) DO UPDATE SET
                raw_messages = excluded.raw_messages,
                last_id = excluded.last_id,
                cached_at = excluded.cached_at",
            params![space_id, payload, last_id, cached_at],
        )?;
        Ok(())
    }

    pub fn load_conversation(&self, space_id: i64) -> Result<Option<CachedConversation>, ChatError> {
        let conn = self.conn.lock();
        let row: Option<(String, Option<i64>, i64)> = conn
            .query_row(
                "SELECT raw_messages, last_id, cached_at
                 FROM conversation_cache WHERE space_id = ?1",
                params![space_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((payload, last_id, cached_at)) => {
                let raw_messages: Vec<Message> = serde_json::from_str(&payload)
                    .storage_context("cache deserialization failed")?;
                Ok(Some(CachedConversation {
                    raw_messages,
                    last_id,
                    cached_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Persist the viewer's read pointer. Monotonic: a smaller incoming
    /// value leaves the stored one untouched.
    pub fn save_read_pointer(&self, space_id: i64, last_read_id: i64) -> Result<(), ChatError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO read_pointer (space_id, last_read_id)
             VALUES (?1, ?2)
             ON CONFLICT(space_id) DO UPDATE SET
                last_read_id = MAX(last_read_id, excluded.last_read_id)",
            params![space_id, last_read_id],
        )?;
        Ok(())
    }

    pub fn load_read_pointer(&self, space_id: i64) -> Result<Option<i64>, ChatError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT last_read_id FROM read_pointer WHERE space_id = ?1",
                params![space_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64) -> Message {
        Message {
            id,
            user_id: format!("u{}", id % 3),
            content: format!("message {}", id),
            created_at: "2024-05-01T10:00:00+00:00".into(),
            ..Default::default()
        }
    }

    #[test]
    fn cache_round_trip_preserves_id_order() {
        let db = Db::open_in_memory().unwrap();
        let messages: Vec<Message> = (1..=10).map(message).collect();
        db.save_conversation(7, &messages).unwrap();

        let cached = db.load_conversation(7).unwrap().unwrap();
        let ids: Vec<i64> = cached.raw_messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<i64>>());
        assert_eq!(cached.last_id, Some(10));
    }

    #[test]
    fn cache_is_trimmed_to_newest_fifty() {
        let db = Db::open_in_memory().unwrap();
        let messages: Vec<Message> = (1..=120).map(message).collect();
        db.save_conversation(7, &messages).unwrap();

        let cached = db.load_conversation(7).unwrap().unwrap();
        assert_eq!(cached.raw_messages.len(), MAX_CACHED_MESSAGES);
        assert_eq!(cached.raw_messages.first().map(|m| m.id), Some(71));
        assert_eq!(cached.last_id, Some(120));
    }

    #[test]
    fn cache_slot_is_overwritten_per_space() {
        let db = Db::open_in_memory().unwrap();
        db.save_conversation(7, &[message(1)]).unwrap();
        db.save_conversation(7, &[message(2), message(3)]).unwrap();
        db.save_conversation(8, &[message(9)]).unwrap();

        let cached = db.load_conversation(7).unwrap().unwrap();
        assert_eq!(cached.last_id, Some(3));
        assert_eq!(db.load_conversation(8).unwrap().unwrap().last_id, Some(9));
    }

    #[test]
    fn read_pointer_never_regresses() {
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.load_read_pointer(7).unwrap(), None);

        db.save_read_pointer(7, 40).unwrap();
        db.save_read_pointer(7, 25).unwrap();
        assert_eq!(db.load_read_pointer(7).unwrap(), Some(40));

        db.save_read_pointer(7, 55).unwrap();
        assert_eq!(db.load_read_pointer(7).unwrap(), Some(55));
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wormhole.db");
        {
            let db = Db::open(&path).unwrap();
            db.save_conversation(3, &[message(1), message(2)]).unwrap();
            db.save_read_pointer(3, 2).unwrap();
        }
        let db = Db::open(&path).unwrap();
        assert_eq!(db.load_conversation(3).unwrap().unwrap().last_id, Some(2));
        assert_eq!(db.load_read_pointer(3).unwrap(), Some(2));
    }
}
