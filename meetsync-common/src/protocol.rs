//! WebSocket protocol for live notification delivery.
//!
//! Messages are JSON objects with a `type` field that determines their structure.
//!
//! ## Connection Flow
//!
//! 1. Client connects to the `/ws` endpoint
//! 2. Client sends `register` announcing its user id
//! 3. Server responds with `register_ack`, or `error` and closes
//! 4. Server pushes `receive_notification` whenever a notification is dispatched
//!    to that user while the connection is open
//! 5. Client may send `send_notification` to notify another user
//!
//! Delivery over the socket is best-effort. Every notification is persisted
//! first, so a client that was offline fetches it over HTTP later.

use serde::{Deserialize, Serialize};

use crate::{Notification, NotificationDraft};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce the identity behind this connection.
    Register { user_id: String },
    /// Ask the server to notify another user.
    SendNotification {
        receiver_id: String,
        notification: NotificationDraft,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledgment of successful registration.
    RegisterAck { user_id: String },
    /// A notification addressed to this user.
    ReceiveNotification { notification: Notification },
    /// Error message from server.
    Error { code: String, message: String },
}
