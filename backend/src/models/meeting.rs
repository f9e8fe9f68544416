use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Whether a meeting happens over video or at a physical location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeetingKind {
    Online,
    InPerson,
}

impl MeetingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingKind::Online => "online",
            MeetingKind::InPerson => "in-person",
        }
    }
}

impl fmt::Display for MeetingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeetingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(MeetingKind::Online),
            "in-person" => Ok(MeetingKind::InPerson),
            other => Err(format!("unknown meeting type: {}", other)),
        }
    }
}

/// A scheduled meeting. Start and end are absolute instants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub agenda: Option<String>,
    #[serde(rename = "type")]
    pub kind: MeetingKind,
    /// Present iff `kind` is in-person.
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Organizer-local calendar date the meeting is anchored to.
    pub date: NaiveDate,
    pub organizer_id: String,
    pub attendee_ids: Vec<String>,
    /// Zone in effect when the meeting was scheduled.
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn is_organizer(&self, user_id: &str) -> bool {
        self.organizer_id == user_id
    }

    /// Attendees other than the organizer.
    pub fn invitees(&self) -> impl Iterator<Item = &String> {
        self.attendee_ids
            .iter()
            .filter(move |id| **id != self.organizer_id)
    }
}

/// Body of `POST /api/meetings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMeeting {
    pub title: String,
    #[serde(default)]
    pub agenda: Option<String>,
    #[serde(rename = "type")]
    pub kind: MeetingKind,
    #[serde(default)]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Defaults to the start's calendar date in `timezone`.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Attendee emails.
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Defaults to the organizer's zone.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Partial update. Only the fields present change; anything else is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeetingPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub agenda: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Replacement attendee emails.
    #[serde(default)]
    pub attendees: Option<Vec<String>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.agenda.is_none()
            && self.location.is_none()
            && self.attendees.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.date.is_none()
            && self.timezone.is_none()
    }
}

/// Meetings visible to one user, split by role.
#[derive(Debug, Clone, Serialize)]
pub struct UserMeetings {
    /// Meetings the user organizes; these are editable by them.
    pub created: Vec<Meeting>,
    /// Meetings the user attends but does not organize.
    pub invited: Vec<Meeting>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&MeetingKind::InPerson).unwrap(), "\"in-person\"");
        assert_eq!("online".parse::<MeetingKind>().unwrap(), MeetingKind::Online);
        assert!("hybrid".parse::<MeetingKind>().is_err());
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let result: Result<MeetingPatch, _> =
            serde_json::from_str(r#"{"title": "New", "organizer_id": "someone-else"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_is_empty() {
        let patch: MeetingPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());

        let patch: MeetingPatch = serde_json::from_str(r#"{"agenda": "Q3"}"#).unwrap();
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_new_meeting_type_field() {
        let json = r#"{
            "title": "Design review",
            "type": "in-person",
            "location": "Room 4",
            "start_time": "2024-06-10T05:00:00Z",
            "end_time": "2024-06-10T06:00:00Z",
            "attendees": ["a@example.com"]
        }"#;
        let new: NewMeeting = serde_json::from_str(json).unwrap();
        assert_eq!(new.kind, MeetingKind::InPerson);
        assert_eq!(new.location.as_deref(), Some("Room 4"));
        assert!(new.date.is_none());
    }
}
