use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::NotificationDispatcher;
use crate::meetings::MeetingEvent;

/// Consume meeting events and notify invitees until the bus closes.
pub fn spawn_notifier(
    mut events: broadcast::Receiver<MeetingEvent>,
    dispatcher: Arc<NotificationDispatcher>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => notify_attendees(&dispatcher, &event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notifier lagged; skipped {} meeting events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Notifier stopped");
    })
}

/// Send the notification matching `event` to every invitee.
///
/// Failures are logged per recipient and never returned.
pub async fn notify_attendees(dispatcher: &NotificationDispatcher, event: &MeetingEvent) {
    let meeting = event.meeting();
    let (title, message) = match event {
        MeetingEvent::Created { .. } => (
            "New meeting",
            format!("You have been invited to \"{}\"", meeting.title),
        ),
        MeetingEvent::Updated { .. } => (
            "Meeting updated",
            format!("\"{}\" has been updated", meeting.title),
        ),
        MeetingEvent::Deleted { .. } => (
            "Meeting cancelled",
            format!("\"{}\" has been cancelled", meeting.title),
        ),
    };
    // A deleted meeting no longer resolves, so the notification carries no link.
    let meeting_id = match event {
        MeetingEvent::Deleted { .. } => None,
        _ => Some(meeting.id.as_str()),
    };

    for recipient in meeting.invitees() {
        if let Err(e) = dispatcher
            .dispatch(recipient, title, &message, meeting_id)
            .await
        {
            tracing::error!(
                "Failed to notify {} about meeting {}: {}",
                recipient,
                meeting.id,
                e
            );
        }
    }
}
