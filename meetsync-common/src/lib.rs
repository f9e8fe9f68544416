//! MeetSync Common Types
//!
//! Shared types used by the backend and its clients.

pub mod notification;
pub mod protocol;
pub mod slot;

pub use notification::{Notification, NotificationDraft};
pub use protocol::{ClientMessage, ServerMessage};
pub use slot::Slot;
