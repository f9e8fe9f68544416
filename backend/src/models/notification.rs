//! Notification types.
//!
//! Re-exported from meetsync-common so the socket protocol and the HTTP API
//! share one shape.

pub use meetsync_common::{Notification, NotificationDraft};
