use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use meetsync_common::Slot;

use super::tz;
use crate::attendees;
use crate::error::{Error, Result};
use crate::models::meeting::Meeting;
use crate::store::{MeetingStore, UserStore};

/// Working day in organizer-local time. Not configurable.
pub const WORKDAY_START_HOUR: u32 = 9;
pub const WORKDAY_END_HOUR: u32 = 18;

/// Longest slot a query may ask for. Meetings never span days.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Raw availability request, as received from a caller.
#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    /// `YYYY-MM-DD`, read in the organizer's zone.
    pub date: String,
    /// Attendee emails.
    pub attendees: Vec<String>,
    /// Organizer user id.
    pub organizer: String,
    /// Slot length; the engine default applies when absent.
    pub duration_minutes: Option<i64>,
}

/// Free slots for one organizer-local day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub date: NaiveDate,
    /// Organizer zone the labels are rendered in.
    pub timezone: String,
    pub slots: Vec<Slot>,
}

/// Computes free windows shared by an organizer and a set of attendees.
///
/// Read-only: it never writes to either store, so any number of queries may
/// run concurrently.
pub struct AvailabilityEngine {
    users: Arc<dyn UserStore>,
    meetings: Arc<dyn MeetingStore>,
    default_duration_minutes: i64,
}

impl AvailabilityEngine {
    pub fn new(
        users: Arc<dyn UserStore>,
        meetings: Arc<dyn MeetingStore>,
        default_duration_minutes: i64,
    ) -> Self {
        Self {
            users,
            meetings,
            default_duration_minutes,
        }
    }

    pub async fn compute_free_slots(&self, query: &AvailabilityQuery) -> Result<Availability> {
        let date = NaiveDate::parse_from_str(query.date.trim(), "%Y-%m-%d")
            .map_err(|_| Error::BadRequest(format!("Invalid date, expected YYYY-MM-DD: {}", query.date)))?;

        let emails = attendees::distinct_emails(&query.attendees);
        if emails.is_empty() {
            return Err(Error::BadRequest("Missing required parameter: attendees".to_string()));
        }

        let organizer_id = query.organizer.trim();
        if organizer_id.is_empty() {
            return Err(Error::BadRequest("Missing required parameter: organizer".to_string()));
        }

        let minutes = query.duration_minutes.unwrap_or(self.default_duration_minutes);
        if minutes <= 0 || minutes > MAX_DURATION_MINUTES {
            return Err(Error::BadRequest(format!(
                "Duration must be between 1 and {} minutes, got {}",
                MAX_DURATION_MINUTES, minutes
            )));
        }
        let duration = Duration::minutes(minutes);

        let organizer = self
            .users
            .find_by_id(organizer_id)
            .await?
            .ok_or_else(|| Error::NotFound("Organizer not found".to_string()))?;
        if !organizer.has_timezone() {
            return Err(Error::InvalidState("Organizer has no timezone set".to_string()));
        }
        let zone = tz::parse_zone(&organizer.timezone).ok_or_else(|| {
            Error::InvalidState(format!("Organizer timezone is not valid: {}", organizer.timezone))
        })?;

        let invitees = attendees::resolve_strict(self.users.as_ref(), &emails).await?;

        let mut participants = vec![organizer.id.clone()];
        for user in &invitees {
            if !participants.contains(&user.id) {
                participants.push(user.id.clone());
            }
        }

        let (day_start, day_end) = tz::day_bounds(&zone, date);
        let conflicts = self
            .meetings
            .find_by_participants_and_date_range(&participants, day_start, day_end)
            .await?;

        let slots = free_slots(&zone, date, duration, &conflicts);

        tracing::debug!(
            organizer = %organizer.id,
            %date,
            participants = participants.len(),
            conflicts = conflicts.len(),
            free = slots.len(),
            "Computed availability"
        );

        Ok(Availability {
            date,
            timezone: organizer.timezone,
            slots,
        })
    }
}

/// Back-to-back windows of `duration` from the start of the working day,
/// keeping only those that end by its close.
pub fn candidate_windows(
    zone: &Tz,
    date: NaiveDate,
    duration: Duration,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let (open, close) = working_hours(zone, date);
    let mut windows = vec![];
    let mut current = open;
    while current + duration <= close {
        windows.push((current, current + duration));
        current += duration;
    }
    windows
}

/// Free windows of `duration` on `date` that overlap none of `busy`.
///
/// Candidates are laid back-to-back from the opening hour. When a candidate
/// collides with a meeting, the next candidate starts where the latest
/// colliding meeting ends.
pub fn free_slots(zone: &Tz, date: NaiveDate, duration: Duration, busy: &[Meeting]) -> Vec<Slot> {
    let (open, close) = working_hours(zone, date);
    let mut slots = vec![];
    let mut current = open;

    while current + duration <= close {
        let end = current + duration;
        let blocked_until = busy
            .iter()
            .filter(|m| tz::overlaps(current, end, m.start_time, m.end_time))
            .map(|m| m.end_time)
            .max();

        match blocked_until {
            Some(resume) => current = resume,
            None => {
                slots.push(Slot {
                    label: tz::format_range(zone, current, end),
                    start_utc: current,
                    end_utc: end,
                });
                current = end;
            }
        }
    }

    slots
}

fn working_hours(zone: &Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        tz::local_instant(zone, date, WORKDAY_START_HOUR, 0),
        tz::local_instant(zone, date, WORKDAY_END_HOUR, 0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::meeting::MeetingKind;
    use crate::models::user::User;
    use crate::store::SqliteStore;
    use chrono::{TimeZone, Timelike};
    use rstest::rstest;

    fn zone(name: &str) -> Tz {
        tz::parse_zone(name).unwrap()
    }

    fn june_10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn busy(zone: &Tz, date: NaiveDate, from: (u32, u32), to: (u32, u32)) -> Meeting {
        let start = tz::local_instant(zone, date, from.0, from.1);
        let end = tz::local_instant(zone, date, to.0, to.1);
        Meeting {
            id: uuid::Uuid::new_v4().to_string(),
            title: "Busy".to_string(),
            agenda: None,
            kind: MeetingKind::Online,
            location: None,
            start_time: start,
            end_time: end,
            date,
            organizer_id: "someone".to_string(),
            attendee_ids: vec![],
            timezone: zone.name().to_string(),
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(60, 9)]
    #[case(30, 18)]
    #[case(45, 12)]
    #[case(120, 4)]
    #[case(540, 1)]
    #[case(541, 0)]
    fn test_grid_size(#[case] minutes: i64, #[case] expected: usize) {
        let windows = candidate_windows(&zone("Asia/Kolkata"), june_10(), Duration::minutes(minutes));
        assert_eq!(windows.len(), expected);
    }

    #[rstest]
    #[case("Asia/Kolkata", 60)]
    #[case("America/New_York", 45)]
    #[case("Pacific/Chatham", 25)]
    fn test_slots_stay_inside_working_day(#[case] name: &str, #[case] minutes: i64) {
        let z = zone(name);
        let slots = free_slots(&z, june_10(), Duration::minutes(minutes), &[]);
        assert!(!slots.is_empty());
        for slot in &slots {
            assert_eq!(slot.duration(), Duration::minutes(minutes));
            let start = slot.start_utc.with_timezone(&z);
            let end = slot.end_utc.with_timezone(&z);
            assert!(start.hour() >= WORKDAY_START_HOUR);
            assert!(end.hour() < WORKDAY_END_HOUR || (end.hour() == WORKDAY_END_HOUR && end.minute() == 0));
            assert_eq!(start.date_naive(), june_10());
        }
    }

    #[test]
    fn test_last_slot_may_end_at_close() {
        let z = zone("Asia/Kolkata");
        let slots = free_slots(&z, june_10(), Duration::minutes(60), &[]);
        assert_eq!(slots.last().unwrap().label, "05:00 PM - 06:00 PM");
    }

    #[test]
    fn test_partial_final_slot_excluded() {
        let z = zone("Asia/Kolkata");
        let slots = free_slots(&z, june_10(), Duration::minutes(120), &[]);
        assert_eq!(slots.len(), 4);
        assert_eq!(slots.last().unwrap().label, "03:00 PM - 05:00 PM");
    }

    #[test]
    fn test_kolkata_scenario_first_free_after_meeting() {
        let z = zone("Asia/Kolkata");
        let meeting = busy(&z, june_10(), (9, 30), (10, 30));
        let slots = free_slots(&z, june_10(), Duration::minutes(60), &[meeting.clone()]);

        assert_eq!(slots[0].label, "10:30 AM - 11:30 AM");
        assert!(slots.iter().all(|s| !s.label.starts_with("09:00")));
        assert!(slots.iter().all(|s| !s.label.starts_with("10:00")));
        for slot in &slots {
            assert!(!tz::overlaps(slot.start_utc, slot.end_utc, meeting.start_time, meeting.end_time));
        }
    }

    #[test]
    fn test_back_to_back_meetings_do_not_block() {
        let z = zone("Asia/Kolkata");
        // Ends exactly when the 10:00 slot starts, starts exactly when it ends.
        let before = busy(&z, june_10(), (9, 0), (10, 0));
        let after = busy(&z, june_10(), (11, 0), (12, 0));
        let slots = free_slots(&z, june_10(), Duration::minutes(60), &[before, after]);

        let labels: Vec<&str> = slots.iter().map(|s| s.label.as_str()).collect();
        assert!(labels.contains(&"10:00 AM - 11:00 AM"));
        assert!(!labels.contains(&"09:00 AM - 10:00 AM"));
        assert!(!labels.contains(&"11:00 AM - 12:00 PM"));
    }

    #[test]
    fn test_fully_booked_day_is_empty() {
        let z = zone("Europe/Berlin");
        let all_day = busy(&z, june_10(), (8, 0), (19, 0));
        assert!(free_slots(&z, june_10(), Duration::minutes(30), &[all_day]).is_empty());
    }

    #[test]
    fn test_spring_forward_day_does_not_panic() {
        let z = zone("America/New_York");
        let transition = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let slots = free_slots(&z, transition, Duration::minutes(60), &[]);
        assert_eq!(slots.len(), 9);
        assert_eq!(slots[0].start_utc, Utc.with_ymd_and_hms(2024, 3, 10, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_free_slots_is_deterministic() {
        let z = zone("Asia/Kolkata");
        let meetings = vec![busy(&z, june_10(), (13, 0), (14, 15))];
        let first = free_slots(&z, june_10(), Duration::minutes(30), &meetings);
        let second = free_slots(&z, june_10(), Duration::minutes(30), &meetings);
        assert_eq!(first, second);
    }

    async fn engine_with_users() -> (AvailabilityEngine, Arc<SqliteStore>, User, User) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let organizer = User::new("Org".into(), "org@example.com", "Asia/Kolkata".into());
        let attendee = User::new("Att".into(), "att@example.com", "Europe/London".into());
        UserStore::insert(store.as_ref(), &organizer).await.unwrap();
        UserStore::insert(store.as_ref(), &attendee).await.unwrap();
        let engine = AvailabilityEngine::new(store.clone(), store.clone(), 60);
        (engine, store, organizer, attendee)
    }

    fn query(organizer: &User, attendees: &[&str]) -> AvailabilityQuery {
        AvailabilityQuery {
            date: "2024-06-10".to_string(),
            attendees: attendees.iter().map(|s| s.to_string()).collect(),
            organizer: organizer.id.clone(),
            duration_minutes: None,
        }
    }

    #[tokio::test]
    async fn test_attendee_meeting_blocks_slot() {
        let (engine, store, organizer, attendee) = engine_with_users().await;
        let z = zone("Asia/Kolkata");
        let mut meeting = busy(&z, june_10(), (9, 30), (10, 30));
        meeting.organizer_id = "third-party".to_string();
        meeting.attendee_ids = vec![attendee.id.clone()];
        MeetingStore::insert(store.as_ref(), &meeting).await.unwrap();

        let result = engine
            .compute_free_slots(&query(&organizer, &["ATT@example.com"]))
            .await
            .unwrap();
        assert_eq!(result.timezone, "Asia/Kolkata");
        assert_eq!(result.slots[0].label, "10:30 AM - 11:30 AM");
    }

    #[tokio::test]
    async fn test_meeting_on_other_day_ignored() {
        let (engine, store, organizer, _) = engine_with_users().await;
        let z = zone("Asia/Kolkata");
        let next_day = NaiveDate::from_ymd_opt(2024, 6, 11).unwrap();
        let mut meeting = busy(&z, next_day, (9, 0), (18, 0));
        meeting.organizer_id = organizer.id.clone();
        MeetingStore::insert(store.as_ref(), &meeting).await.unwrap();

        let result = engine
            .compute_free_slots(&query(&organizer, &["att@example.com"]))
            .await
            .unwrap();
        assert_eq!(result.slots.len(), 9);
    }

    #[tokio::test]
    async fn test_unknown_attendee_is_invalid_argument() {
        let (engine, _, organizer, _) = engine_with_users().await;
        let err = engine
            .compute_free_slots(&query(&organizer, &["att@example.com", "ghost@example.com"]))
            .await
            .unwrap_err();
        match err {
            Error::InvalidArgument(msg) => assert!(msg.contains("ghost@example.com")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_organizer_is_not_found() {
        let (engine, _, _, _) = engine_with_users().await;
        let mut q = query(&User::new("X".into(), "x@example.com", "UTC".into()), &["att@example.com"]);
        q.organizer = "missing".to_string();
        assert!(matches!(engine.compute_free_slots(&q).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_organizer_without_timezone_is_invalid_state() {
        let (engine, store, _, _) = engine_with_users().await;
        let no_zone = User::new("Nz".into(), "nz@example.com", String::new());
        UserStore::insert(store.as_ref(), &no_zone).await.unwrap();

        let result = engine.compute_free_slots(&query(&no_zone, &["att@example.com"])).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[rstest]
    #[case("2024-13-01", Some(60))]
    #[case("", Some(60))]
    #[case("2024-06-10", Some(0))]
    #[case("2024-06-10", Some(-15))]
    #[case("2024-06-10", Some(MAX_DURATION_MINUTES + 1))]
    #[tokio::test]
    async fn test_bad_parameters(#[case] date: &str, #[case] duration: Option<i64>) {
        let (engine, _, organizer, _) = engine_with_users().await;
        let mut q = query(&organizer, &["att@example.com"]);
        q.date = date.to_string();
        q.duration_minutes = duration;
        assert!(matches!(engine.compute_free_slots(&q).await, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_empty_attendees_is_bad_request() {
        let (engine, _, organizer, _) = engine_with_users().await;
        let q = query(&organizer, &[" "]);
        assert!(matches!(engine.compute_free_slots(&q).await, Err(Error::BadRequest(_))));
    }
}
