//! Per-conversation synchronized state.
//!
//! This module contains:
//! - `store`: the authoritative raw message list and its merge rules
//! - `presence`: the ephemeral online set (replace-on-snapshot)
//! - `typing`: local edge-triggered emission and the remote typing set
//! - `receipts`: the monotonic read-pointer map and derived computations

pub mod presence;
pub mod receipts;
pub mod store;
pub mod typing;

pub use presence::{PresenceEntry, PresenceTracker};
pub use receipts::{compute_read_count, compute_unread_divider, ReadReceiptTracker};
pub use store::{MessageStore, PrependOutcome};
pub use typing::TypingCoordinator;
