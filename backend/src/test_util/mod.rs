//! Helpers shared by unit and integration tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::{
    Config, CorsConfig, DatabaseConfig, LoggingConfig, RealtimeConfig, ReminderConfig,
    SchedulingConfig,
};
use crate::models::meeting::{Meeting, MeetingKind};
use crate::models::user::User;
use crate::store::{MeetingStore, SqliteStore, UserStore};
use crate::AppState;

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
        scheduling: SchedulingConfig {
            default_duration_minutes: 60,
            default_timezone: "Asia/Kolkata".to_string(),
        },
        reminders: ReminderConfig {
            enabled: false,
            lead_minutes: 30,
        },
        realtime: RealtimeConfig {
            registration_timeout_secs: 2,
            channel_capacity: 8,
            event_capacity: 64,
        },
    }
}

/// State over a fresh in-memory store. Subscribers are not started.
pub fn create_test_state() -> Arc<AppState> {
    create_test_state_with(test_config())
}

pub fn create_test_state_with(config: Config) -> Arc<AppState> {
    let store = Arc::new(SqliteStore::in_memory().expect("Failed to open in-memory store"));
    Arc::new(AppState::new(config, store))
}

/// Insert a user; the name is derived from the email.
pub async fn seed_user(state: &AppState, email: &str, timezone: &str) -> User {
    let name = email.split('@').next().unwrap_or(email).to_string();
    let user = User::new(name, email, timezone.to_string());
    state
        .users
        .insert(&user)
        .await
        .expect("Failed to seed user");
    user
}

/// Insert an online meeting directly, bypassing validation and events.
pub async fn seed_meeting(
    state: &AppState,
    organizer: &User,
    attendees: &[&User],
    start: DateTime<Utc>,
    minutes: i64,
) -> Meeting {
    let meeting = Meeting {
        id: uuid::Uuid::new_v4().to_string(),
        title: "Seeded".to_string(),
        agenda: None,
        kind: MeetingKind::Online,
        location: None,
        start_time: start,
        end_time: start + Duration::minutes(minutes),
        date: start.date_naive(),
        organizer_id: organizer.id.clone(),
        attendee_ids: attendees.iter().map(|u| u.id.clone()).collect(),
        timezone: organizer.timezone.clone(),
        created_at: Utc::now(),
    };
    state
        .meetings
        .insert(&meeting)
        .await
        .expect("Failed to seed meeting");
    meeting
}
