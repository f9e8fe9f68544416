//! Registry of live notification channels, one per connected user.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

use meetsync_common::ServerMessage;

/// Outbound side of one registered socket.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    /// Identifies this particular connection, not the user.
    pub id: String,
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<ServerMessage>,
}

impl ChannelHandle {
    pub fn new(user_id: String, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            connected_at: Utc::now(),
            tx,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PushError {
    #[error("user {0} has no live channel")]
    Offline(String),
    #[error("channel for user {0} is full")]
    Full(String),
    #[error("channel for user {0} is closed")]
    Closed(String),
}

/// Maps user ids to their current connection.
///
/// A user has at most one live channel; registering again replaces it.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, ChannelHandle>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle`, returning the connection it displaced, if any.
    pub async fn register(&self, handle: ChannelHandle) -> Option<ChannelHandle> {
        let previous = self
            .channels
            .write()
            .await
            .insert(handle.user_id.clone(), handle);
        if let Some(ref old) = previous {
            tracing::info!(
                "User {} reconnected; replacing channel {}",
                old.user_id,
                old.id
            );
        }
        previous
    }

    /// Remove the user's channel only if it is still the one identified by
    /// `handle_id`. A socket closing after its user reconnected elsewhere must
    /// not evict the newer connection.
    pub async fn unregister(&self, user_id: &str, handle_id: &str) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(user_id) {
            Some(current) if current.id == handle_id => {
                channels.remove(user_id);
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, user_id: &str) -> Option<ChannelHandle> {
        self.channels.read().await.get(user_id).cloned()
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.channels.read().await.contains_key(user_id)
    }

    /// Queue a message for the user's socket without waiting.
    pub async fn push_to(&self, user_id: &str, message: ServerMessage) -> Result<(), PushError> {
        let handle = self
            .lookup(user_id)
            .await
            .ok_or_else(|| PushError::Offline(user_id.to_string()))?;

        handle.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full(user_id.to_string()),
            mpsc::error::TrySendError::Closed(_) => PushError::Closed(user_id.to_string()),
        })
    }

    pub async fn count(&self) -> usize {
        self.channels.read().await.len()
    }
}
