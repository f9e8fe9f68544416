use std::sync::Arc;

use chrono::Utc;

use super::{EventBus, MeetingEvent};
use crate::attendees;
use crate::availability::tz;
use crate::error::{Error, Result};
use crate::models::meeting::{Meeting, MeetingKind, MeetingPatch, NewMeeting, UserMeetings};
use crate::models::user::User;
use crate::store::{MeetingStore, UserStore};

/// Creates, edits and removes meetings on behalf of their organizer.
///
/// Side effects (notifications, reminders) are published as events after the
/// record is written; they never influence the result returned here.
pub struct MeetingService {
    users: Arc<dyn UserStore>,
    meetings: Arc<dyn MeetingStore>,
    events: EventBus,
}

impl MeetingService {
    pub fn new(users: Arc<dyn UserStore>, meetings: Arc<dyn MeetingStore>, events: EventBus) -> Self {
        Self {
            users,
            meetings,
            events,
        }
    }

    pub async fn create(&self, data: NewMeeting, organizer_id: &str) -> Result<Meeting> {
        let title = required_title(&data.title)?;
        check_interval(&data)?;

        let organizer = self
            .users
            .find_by_id(organizer_id)
            .await?
            .ok_or_else(|| Error::NotFound("Organizer not found".to_string()))?;

        let timezone = match data.timezone.as_deref().map(str::trim) {
            Some(zone) if !zone.is_empty() => zone.to_string(),
            _ if organizer.has_timezone() => organizer.timezone.clone(),
            _ => return Err(Error::InvalidState("Organizer has no timezone set".to_string())),
        };
        let zone = tz::parse_zone(&timezone)
            .ok_or_else(|| Error::BadRequest(format!("Unknown timezone: {}", timezone)))?;

        let location = location_for(data.kind, data.location.as_deref())?;
        let invitees = attendees::resolve_strict(self.users.as_ref(), &data.attendees).await?;

        let meeting = Meeting {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            agenda: non_empty(data.agenda),
            kind: data.kind,
            location,
            start_time: data.start_time,
            end_time: data.end_time,
            date: data
                .date
                .unwrap_or_else(|| tz::local_date(&zone, data.start_time)),
            organizer_id: organizer.id.clone(),
            attendee_ids: invitees.iter().map(|u| u.id.clone()).collect(),
            timezone,
            created_at: Utc::now(),
        };

        self.meetings.insert(&meeting).await?;
        tracing::info!(
            "Meeting {} created by {} with {} attendees",
            meeting.id,
            organizer.id,
            meeting.attendee_ids.len()
        );

        self.events.publish(MeetingEvent::Created {
            meeting: meeting.clone(),
            attendees: invitees,
        });

        Ok(meeting)
    }

    pub async fn update(
        &self,
        meeting_id: &str,
        patch: MeetingPatch,
        requester_id: &str,
    ) -> Result<Meeting> {
        let mut meeting = self.owned_meeting(meeting_id, requester_id).await?;
        if patch.is_empty() {
            return Ok(meeting);
        }
        // The anchor date follows the start unless the caller pins it.
        let reanchor =
            patch.date.is_none() && (patch.start_time.is_some() || patch.timezone.is_some());
        let mut invitees = None;

        if let Some(title) = patch.title {
            meeting.title = required_title(&title)?;
        }
        if patch.agenda.is_some() {
            meeting.agenda = non_empty(patch.agenda);
        }
        if let Some(location) = patch.location {
            if meeting.kind == MeetingKind::InPerson {
                meeting.location = location_for(meeting.kind, Some(&location))?;
            } else {
                tracing::debug!("Ignoring location on online meeting {}", meeting.id);
            }
        }
        if let Some(emails) = patch.attendees {
            let resolved = attendees::resolve_strict(self.users.as_ref(), &emails).await?;
            meeting.attendee_ids = resolved.iter().map(|u| u.id.clone()).collect();
            invitees = Some(resolved);
        }
        if let Some(timezone) = patch.timezone {
            let timezone = timezone.trim().to_string();
            if tz::parse_zone(&timezone).is_none() {
                return Err(Error::BadRequest(format!("Unknown timezone: {}", timezone)));
            }
            meeting.timezone = timezone;
        }
        if let Some(start) = patch.start_time {
            meeting.start_time = start;
        }
        if let Some(end) = patch.end_time {
            meeting.end_time = end;
        }
        if let Some(date) = patch.date {
            meeting.date = date;
        } else if reanchor {
            if let Some(zone) = tz::parse_zone(&meeting.timezone) {
                meeting.date = tz::local_date(&zone, meeting.start_time);
            }
        }
        if meeting.start_time >= meeting.end_time {
            return Err(Error::BadRequest(
                "Meeting must end after it starts".to_string(),
            ));
        }

        if !self.meetings.update_by_id(&meeting.id, &meeting).await? {
            return Err(Error::NotFound("Meeting not found".to_string()));
        }
        tracing::info!("Meeting {} updated by {}", meeting.id, requester_id);

        let attendees = match invitees {
            Some(resolved) => resolved,
            None => self.current_attendees(&meeting).await?,
        };
        self.events.publish(MeetingEvent::Updated {
            meeting: meeting.clone(),
            attendees,
        });

        Ok(meeting)
    }

    pub async fn delete(&self, meeting_id: &str, requester_id: &str) -> Result<()> {
        let meeting = self.owned_meeting(meeting_id, requester_id).await?;

        if !self.meetings.delete_by_id(&meeting.id).await? {
            return Err(Error::NotFound("Meeting not found".to_string()));
        }
        tracing::info!("Meeting {} deleted by {}", meeting.id, requester_id);

        self.events.publish(MeetingEvent::Deleted { meeting });
        Ok(())
    }

    /// Any caller may read any meeting.
    pub async fn get_by_id(&self, meeting_id: &str) -> Result<Meeting> {
        self.meetings
            .find_by_id(meeting_id)
            .await?
            .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<UserMeetings> {
        let created = self.meetings.find_by_organizer(user_id).await?;
        let invited = self.meetings.find_by_attendee_excluding_organizer(user_id).await?;
        Ok(UserMeetings { created, invited })
    }

    /// Attendee records for the stored ids. Users deleted since are skipped.
    async fn current_attendees(&self, meeting: &Meeting) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(meeting.attendee_ids.len());
        for id in &meeting.attendee_ids {
            match self.users.find_by_id(id).await? {
                Some(user) => users.push(user),
                None => tracing::debug!("Attendee {} of meeting {} no longer exists", id, meeting.id),
            }
        }
        Ok(users)
    }

    async fn owned_meeting(&self, meeting_id: &str, requester_id: &str) -> Result<Meeting> {
        let meeting = self.get_by_id(meeting_id).await?;
        if !meeting.is_organizer(requester_id) {
            tracing::warn!(
                "User {} attempted to modify meeting {} they do not organize",
                requester_id,
                meeting_id
            );
            return Err(Error::Forbidden("Unauthorized".to_string()));
        }
        Ok(meeting)
    }
}

fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::BadRequest("Meeting title is required".to_string()));
    }
    Ok(title.to_string())
}

fn check_interval(data: &NewMeeting) -> Result<()> {
    if data.start_time >= data.end_time {
        return Err(Error::BadRequest("Meeting must end after it starts".to_string()));
    }
    Ok(())
}

/// In-person meetings need a location; online ones never keep one.
fn location_for(kind: MeetingKind, location: Option<&str>) -> Result<Option<String>> {
    match kind {
        MeetingKind::Online => Ok(None),
        MeetingKind::InPerson => match location.map(str::trim) {
            Some(place) if !place.is_empty() => Ok(Some(place.to_string())),
            _ => Err(Error::InvalidState(
                "In-person meetings require a location".to_string(),
            )),
        },
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use crate::store::SqliteStore;
    use chrono::{DateTime, NaiveDate, TimeZone};
    use tokio::sync::broadcast::error::TryRecvError;

    struct Fixture {
        service: MeetingService,
        events: tokio::sync::broadcast::Receiver<MeetingEvent>,
        organizer: User,
        attendee: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let organizer = User::new("Org".into(), "org@example.com", "Asia/Kolkata".into());
        let attendee = User::new("Att".into(), "att@example.com", "America/New_York".into());
        UserStore::insert(store.as_ref(), &organizer).await.unwrap();
        UserStore::insert(store.as_ref(), &attendee).await.unwrap();

        let bus = EventBus::new(16);
        let events = bus.subscribe();
        Fixture {
            service: MeetingService::new(store.clone(), store, bus),
            events,
            organizer,
            attendee,
        }
    }

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap()
    }

    fn new_meeting(attendees: &[&str]) -> NewMeeting {
        NewMeeting {
            title: "Planning".to_string(),
            agenda: Some("Roadmap".to_string()),
            kind: MeetingKind::Online,
            location: Some("ignored".to_string()),
            start_time: utc(20, 0),
            end_time: utc(21, 0),
            date: None,
            attendees: attendees.iter().map(|s| s.to_string()).collect(),
            timezone: None,
        }
    }

    #[tokio::test]
    async fn test_create_resolves_attendees_and_publishes() {
        let mut f = fixture().await;
        let meeting = f
            .service
            .create(new_meeting(&["ATT@example.com", "att@example.com"]), &f.organizer.id)
            .await
            .unwrap();

        assert_eq!(meeting.attendee_ids, vec![f.attendee.id.clone()]);
        assert_eq!(meeting.organizer_id, f.organizer.id);
        assert_eq!(meeting.timezone, "Asia/Kolkata");
        assert!(meeting.location.is_none());
        // 20:00 UTC is already the next day in Kolkata.
        assert_eq!(meeting.date, NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());

        match f.events.try_recv().unwrap() {
            MeetingEvent::Created { meeting: m, attendees } => {
                assert_eq!(m.id, meeting.id);
                assert_eq!(attendees.len(), 1);
                assert_eq!(attendees[0].email, "att@example.com");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_email_without_persisting() {
        let mut f = fixture().await;
        let err = f
            .service
            .create(new_meeting(&["att@example.com", "ghost@example.com"]), &f.organizer.id)
            .await
            .unwrap_err();
        match err {
            Error::InvalidArgument(msg) => assert!(msg.contains("ghost@example.com")),
            other => panic!("unexpected error: {:?}", other),
        }

        let listed = f.service.list_for_user(&f.organizer.id).await.unwrap();
        assert!(listed.created.is_empty());
        assert!(matches!(f.events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_in_person_requires_location() {
        let f = fixture().await;
        let mut data = new_meeting(&[]);
        data.kind = MeetingKind::InPerson;
        data.location = Some("   ".to_string());
        let result = f.service.create(data, &f.organizer.id).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));

        let mut data = new_meeting(&[]);
        data.kind = MeetingKind::InPerson;
        data.location = Some(" Room 4 ".to_string());
        let meeting = f.service.create(data, &f.organizer.id).await.unwrap();
        assert_eq!(meeting.location.as_deref(), Some("Room 4"));
    }

    #[tokio::test]
    async fn test_create_validates_interval_and_timezone() {
        let f = fixture().await;
        let mut data = new_meeting(&[]);
        data.end_time = data.start_time;
        assert!(matches!(
            f.service.create(data, &f.organizer.id).await,
            Err(Error::BadRequest(_))
        ));

        let mut data = new_meeting(&[]);
        data.timezone = Some("Atlantis/Capital".to_string());
        assert!(matches!(
            f.service.create(data, &f.organizer.id).await,
            Err(Error::BadRequest(_))
        ));

        assert!(matches!(
            f.service.create(new_meeting(&[]), "nobody").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_merges_only_given_fields() {
        let mut f = fixture().await;
        let meeting = f
            .service
            .create(new_meeting(&["att@example.com"]), &f.organizer.id)
            .await
            .unwrap();
        let _ = f.events.try_recv();

        let patch: MeetingPatch =
            serde_json::from_str(r#"{"title": "Planning v2", "location": "Room 9"}"#).unwrap();
        let updated = f.service.update(&meeting.id, patch, &f.organizer.id).await.unwrap();

        assert_eq!(updated.title, "Planning v2");
        assert_eq!(updated.agenda.as_deref(), Some("Roadmap"));
        assert_eq!(updated.attendee_ids, meeting.attendee_ids);
        assert!(updated.location.is_none());
        assert_eq!(f.service.get_by_id(&meeting.id).await.unwrap().title, "Planning v2");
        match f.events.try_recv() {
            Ok(MeetingEvent::Updated { attendees, .. }) => {
                assert_eq!(attendees.len(), 1);
                assert_eq!(attendees[0].id, f.attendee.id);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_replacing_attendees_publishes_new_list() {
        let mut f = fixture().await;
        let meeting = f
            .service
            .create(new_meeting(&["att@example.com"]), &f.organizer.id)
            .await
            .unwrap();
        let _ = f.events.try_recv();

        let patch = MeetingPatch {
            attendees: Some(vec!["org@example.com".to_string()]),
            ..Default::default()
        };
        let updated = f.service.update(&meeting.id, patch, &f.organizer.id).await.unwrap();
        assert_eq!(updated.attendee_ids, vec![f.organizer.id.clone()]);

        match f.events.try_recv() {
            Ok(MeetingEvent::Updated { attendees, .. }) => {
                let emails: Vec<&str> = attendees.iter().map(|u| u.email.as_str()).collect();
                assert_eq!(emails, vec!["org@example.com"]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_moving_start_reanchors_local_date() {
        let f = fixture().await;
        // 20:00 UTC is 01:30 on the 11th in Kolkata.
        let meeting = f.service.create(new_meeting(&[]), &f.organizer.id).await.unwrap();
        assert_eq!(meeting.date, NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());

        let patch = MeetingPatch {
            start_time: Some(utc(6, 0)),
            end_time: Some(utc(7, 0)),
            ..Default::default()
        };
        let moved = f.service.update(&meeting.id, patch, &f.organizer.id).await.unwrap();
        assert_eq!(moved.date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());

        let patch = MeetingPatch {
            start_time: Some(utc(20, 0)),
            end_time: Some(utc(21, 0)),
            date: Some(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()),
            ..Default::default()
        };
        let pinned = f.service.update(&meeting.id, patch, &f.organizer.id).await.unwrap();
        assert_eq!(pinned.date, NaiveDate::from_ymd_opt(2024, 6, 12).unwrap());
        assert_eq!(f.service.get_by_id(&meeting.id).await.unwrap().date, pinned.date);
    }

    #[tokio::test]
    async fn test_update_rejects_inverted_interval() {
        let f = fixture().await;
        let meeting = f.service.create(new_meeting(&[]), &f.organizer.id).await.unwrap();
        let patch = MeetingPatch {
            end_time: Some(utc(19, 0)),
            ..Default::default()
        };
        let result = f.service.update(&meeting.id, patch, &f.organizer.id).await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
        assert_eq!(f.service.get_by_id(&meeting.id).await.unwrap().end_time, utc(21, 0));
    }

    #[tokio::test]
    async fn test_only_organizer_may_mutate() {
        let f = fixture().await;
        let meeting = f
            .service
            .create(new_meeting(&["att@example.com"]), &f.organizer.id)
            .await
            .unwrap();

        let patch = MeetingPatch {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(&meeting.id, patch, &f.attendee.id).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            f.service.delete(&meeting.id, &f.attendee.id).await,
            Err(Error::Forbidden(_))
        ));
        assert!(f.service.get_by_id(&meeting.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_removes_and_publishes() {
        let mut f = fixture().await;
        let meeting = f.service.create(new_meeting(&[]), &f.organizer.id).await.unwrap();
        let _ = f.events.try_recv();

        f.service.delete(&meeting.id, &f.organizer.id).await.unwrap();
        assert!(matches!(f.service.get_by_id(&meeting.id).await, Err(Error::NotFound(_))));
        assert!(matches!(f.events.try_recv(), Ok(MeetingEvent::Deleted { .. })));
        assert!(matches!(
            f.service.delete(&meeting.id, &f.organizer.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_splits_created_and_invited() {
        let f = fixture().await;
        let mine = f
            .service
            .create(new_meeting(&["att@example.com"]), &f.organizer.id)
            .await
            .unwrap();

        let for_organizer = f.service.list_for_user(&f.organizer.id).await.unwrap();
        assert_eq!(for_organizer.created.len(), 1);
        assert!(for_organizer.invited.is_empty());

        let for_attendee = f.service.list_for_user(&f.attendee.id).await.unwrap();
        assert!(for_attendee.created.is_empty());
        assert_eq!(for_attendee.invited[0].id, mine.id);
    }
}
