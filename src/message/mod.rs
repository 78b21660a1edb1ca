//! Message domain: wire types, outbound delivery, and view projection.

pub mod sending;
pub mod types;
pub mod view;

pub use sending::{announce_read, deliver_message, ComposeState, DeliveryPath};
pub use types::{Message, MessageCreate, MessageType, Reader};
pub use view::{project_all, project_message, MessageView, ReplyPreview};
