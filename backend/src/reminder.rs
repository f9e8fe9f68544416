//! One-shot meeting reminders.
//!
//! Reminders live only in memory: a restart drops every pending reminder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::meetings::MeetingEvent;
use crate::models::meeting::Meeting;
use crate::models::user::User;

/// Errors raised while delivering a reminder.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

/// Outbound reminder channel, typically email.
#[async_trait]
pub trait ReminderSender: Send + Sync {
    async fn send_reminder(&self, recipient_email: &str, meeting: &Meeting)
        -> Result<(), ReminderError>;
}

/// Sender that only writes the reminder to the log.
#[derive(Debug, Default)]
pub struct LogReminderSender;

#[async_trait]
impl ReminderSender for LogReminderSender {
    async fn send_reminder(
        &self,
        recipient_email: &str,
        meeting: &Meeting,
    ) -> Result<(), ReminderError> {
        tracing::info!(
            "Reminder for {}: \"{}\" starts at {}",
            recipient_email,
            meeting.title,
            meeting.start_time.to_rfc3339()
        );
        Ok(())
    }
}

/// Time to wait before firing; zero when the reminder instant has passed.
pub fn reminder_delay(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    lead: Duration,
) -> std::time::Duration {
    (start - lead - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

/// Last reminder armed for a meeting.
struct ArmedReminder {
    start: DateTime<Utc>,
    recipients: Vec<String>,
    task: JoinHandle<()>,
}

/// Keeps one reminder task per meeting.
///
/// Fired reminders are remembered until their meeting starts, so an edit that
/// changes neither the start nor the recipients does not send a second one.
pub struct ReminderScheduler {
    sender: Arc<dyn ReminderSender>,
    lead: Duration,
    armed: Mutex<HashMap<String, ArmedReminder>>,
}

impl ReminderScheduler {
    pub fn new(sender: Arc<dyn ReminderSender>, lead_minutes: i64) -> Self {
        Self {
            sender,
            lead: Duration::minutes(lead_minutes),
            armed: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule a reminder for `recipients`, replacing any pending one for the meeting.
    pub fn schedule(&self, meeting: Meeting, recipients: Vec<String>) {
        if recipients.is_empty() {
            self.cancel(&meeting.id);
            return;
        }

        let now = Utc::now();
        let delay = reminder_delay(meeting.start_time, now, self.lead);
        let meeting_id = meeting.id.clone();
        let start = meeting.start_time;
        let sender = self.sender.clone();
        tracing::debug!(
            "Reminder for meeting {} in {}s to {} recipients",
            meeting_id,
            delay.as_secs(),
            recipients.len()
        );

        let to_send = recipients.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for email in &to_send {
                if let Err(e) = sender.send_reminder(email, &meeting).await {
                    tracing::warn!("Reminder for meeting {} not sent: {}", meeting.id, e);
                }
            }
        });

        let mut armed = self.lock_armed();
        armed.retain(|_, r| !r.task.is_finished() || r.start > now);
        let replaced = armed.insert(
            meeting_id,
            ArmedReminder {
                start,
                recipients,
                task,
            },
        );
        if let Some(previous) = replaced {
            previous.task.abort();
        }
    }

    /// Re-arm after an edit. A reminder that already went out for the same
    /// start and recipients is not repeated.
    pub fn reschedule(&self, meeting: Meeting, recipients: Vec<String>) {
        let already_sent = self.lock_armed().get(&meeting.id).map_or(false, |r| {
            r.task.is_finished() && r.start == meeting.start_time && r.recipients == recipients
        });
        if already_sent {
            tracing::debug!("Reminder for meeting {} already sent", meeting.id);
            return;
        }
        self.schedule(meeting, recipients);
    }

    /// Abort the pending reminder for a meeting. Returns whether one was pending.
    pub fn cancel(&self, meeting_id: &str) -> bool {
        match self.lock_armed().remove(meeting_id) {
            Some(reminder) => {
                let was_pending = !reminder.task.is_finished();
                reminder.task.abort();
                if was_pending {
                    tracing::debug!("Cancelled reminder for meeting {}", meeting_id);
                }
                was_pending
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock_armed()
            .values()
            .filter(|r| !r.task.is_finished())
            .count()
    }

    fn lock_armed(&self) -> std::sync::MutexGuard<'_, HashMap<String, ArmedReminder>> {
        // A panic while holding the lock leaves the map usable.
        self.armed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Invitee emails, leaving out the organizer.
fn recipient_emails(meeting: &Meeting, attendees: Vec<User>) -> Vec<String> {
    attendees
        .into_iter()
        .filter(|u| u.id != meeting.organizer_id)
        .map(|u| u.email)
        .collect()
}

/// Consume meeting events: schedule on create, re-arm on update, cancel on delete.
pub fn spawn_reminder_worker(
    mut events: broadcast::Receiver<MeetingEvent>,
    scheduler: Arc<ReminderScheduler>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MeetingEvent::Created { meeting, attendees }) => {
                    let emails = recipient_emails(&meeting, attendees);
                    scheduler.schedule(meeting, emails);
                }
                Ok(MeetingEvent::Updated { meeting, attendees }) => {
                    let emails = recipient_emails(&meeting, attendees);
                    scheduler.reschedule(meeting, emails);
                }
                Ok(MeetingEvent::Deleted { meeting }) => {
                    scheduler.cancel(&meeting.id);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Reminder worker lagged; skipped {} meeting events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Reminder worker stopped");
    })
}
