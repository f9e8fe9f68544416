use tokio::sync::broadcast;

use crate::models::meeting::Meeting;
use crate::models::user::User;

/// Emitted after a meeting mutation has been persisted.
#[derive(Debug, Clone)]
pub enum MeetingEvent {
    Created {
        meeting: Meeting,
        /// Resolved attendee records, in invitation order.
        attendees: Vec<User>,
    },
    Updated {
        meeting: Meeting,
        /// Current attendee records after the update.
        attendees: Vec<User>,
    },
    Deleted {
        meeting: Meeting,
    },
}

impl MeetingEvent {
    pub fn meeting(&self) -> &Meeting {
        match self {
            MeetingEvent::Created { meeting, .. }
            | MeetingEvent::Updated { meeting, .. }
            | MeetingEvent::Deleted { meeting } => meeting,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MeetingEvent::Created { .. } => "created",
            MeetingEvent::Updated { .. } => "updated",
            MeetingEvent::Deleted { .. } => "deleted",
        }
    }
}

/// Fan-out of meeting events to independent subscribers.
///
/// Each subscriber owns its receiver, so a slow or failing subscriber only
/// affects itself.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MeetingEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish without waiting. Having no subscribers is not an error.
    pub fn publish(&self, event: MeetingEvent) {
        let name = event.name();
        let meeting_id = event.meeting().id.clone();
        match self.tx.send(event) {
            Ok(receivers) => tracing::debug!(
                "Published meeting {} event for {} to {} subscribers",
                name,
                meeting_id,
                receivers
            ),
            Err(_) => tracing::debug!(
                "No subscribers for meeting {} event on {}",
                name,
                meeting_id
            ),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeetingEvent> {
        self.tx.subscribe()
    }
}
