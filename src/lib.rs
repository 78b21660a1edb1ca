//! Real-time chat synchronization engine for Wormhole spaces.
//!
//! Keeps a local, persisted view of a conversation consistent with a push
//! channel carrying live events, a paginated pull-based history API, and
//! optimistic local sends, while tracking three ephemeral cross-cutting
//! protocols: presence, typing, and read receipts.
//!
//! The engine is framework-agnostic: the screen layer drives a
//! [`ChatController`] per open conversation and paints from the immutable
//! [`ConversationView`] snapshots it projects.

pub mod config;
pub mod connection;
pub mod controller;
pub mod db;
pub mod frame;
pub mod message;
pub mod net;
pub mod session;
pub mod shared;
pub mod state;
pub mod timers;

pub use config::Endpoints;
pub use connection::{ChannelEvent, ConnectionManager, LinkState};
pub use controller::{ChatController, ChatEvents, ConversationView};
pub use db::{CachedConversation, Db};
pub use frame::{OutboundFrame, PushFrame};
pub use message::{Message, MessageCreate, MessageType, MessageView, Reader};
pub use net::{ChatApi, HistoryPage};
pub use session::{Session, SpaceMember};
pub use shared::{ChatError, ResultExt};
pub use state::{MessageStore, PresenceTracker, ReadReceiptTracker, TypingCoordinator};
pub use timers::{TimerKey, TimerRegistry};
