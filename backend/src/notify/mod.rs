//! Notification persistence and live delivery over WebSocket.

mod dispatcher;
mod notifier;
mod registry;
pub mod ws;

pub use dispatcher::{Delivery, NotificationDispatcher};
pub use notifier::{notify_attendees, spawn_notifier};
pub use registry::{ChannelHandle, ChannelRegistry, PushError};
