//! Notification records delivered to meeting participants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted notification for a single recipient.
///
/// The record is immutable apart from `is_read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// User the notification belongs to.
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    /// Meeting this notification is about, if any.
    #[serde(default)]
    pub meeting_id: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create a new unread notification stamped with the current time.
    pub fn new(
        recipient_id: String,
        title: String,
        message: String,
        meeting_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_id,
            title,
            message,
            meeting_id,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// Notification content supplied by a sender, before a recipient is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub meeting_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(
            "user-1".to_string(),
            "New meeting".to_string(),
            "Standup".to_string(),
            None,
        );
        assert!(!n.is_read);
        assert!(uuid::Uuid::parse_str(&n.id).is_ok());
        assert_eq!(n.recipient_id, "user-1");
    }

    #[test]
    fn test_draft_meeting_id_is_optional() {
        let draft: NotificationDraft =
            serde_json::from_str(r#"{"title": "Hi", "message": "there"}"#).unwrap();
        assert!(draft.meeting_id.is_none());
    }
}
