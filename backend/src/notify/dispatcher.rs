use std::sync::Arc;

use meetsync_common::{Notification, ServerMessage};

use super::registry::{ChannelRegistry, PushError};
use crate::error::Result;
use crate::store::NotificationStore;

/// Outcome of a single dispatch.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification: Notification,
    /// Whether the notification was queued on a live channel.
    pub pushed: bool,
}

/// Persists notifications and pushes them to connected recipients.
///
/// The stored record is authoritative; the live push is at-most-once.
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    registry: Arc<ChannelRegistry>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, registry: Arc<ChannelRegistry>) -> Self {
        Self { store, registry }
    }

    /// Persist a notification for `recipient_id` and push it if they are online.
    ///
    /// Only a persistence failure is returned.
    pub async fn dispatch(
        &self,
        recipient_id: &str,
        title: &str,
        message: &str,
        meeting_id: Option<&str>,
    ) -> Result<Delivery> {
        let notification = Notification::new(
            recipient_id.to_string(),
            title.to_string(),
            message.to_string(),
            meeting_id.map(str::to_string),
        );
        self.store.insert(&notification).await?;

        let push = ServerMessage::ReceiveNotification {
            notification: notification.clone(),
        };
        let pushed = match self.registry.push_to(recipient_id, push).await {
            Ok(()) => {
                tracing::debug!("Pushed notification {} to {}", notification.id, recipient_id);
                true
            }
            Err(PushError::Offline(_)) => {
                tracing::debug!(
                    "Recipient {} offline; notification {} stored only",
                    recipient_id,
                    notification.id
                );
                false
            }
            Err(e) => {
                tracing::warn!("Live push of notification {} failed: {}", notification.id, e);
                false
            }
        };

        Ok(Delivery {
            notification,
            pushed,
        })
    }
}
