//! Record store collaborators.
//!
//! The core only needs a handful of predicate queries, expressed as traits so
//! the availability engine and services can be driven by any backing store.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::meeting::Meeting;
use crate::models::notification::Notification;
use crate::models::user::User;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Users whose email matches any of `emails`, case-insensitively.
    async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<User>, StoreError>;
    /// Returns false if no such user exists.
    async fn update_timezone(&self, id: &str, timezone: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn insert(&self, meeting: &Meeting) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Meeting>, StoreError>;
    /// Replace the stored record with `meeting`. Returns false if it does not exist.
    async fn update_by_id(&self, id: &str, meeting: &Meeting) -> Result<bool, StoreError>;
    /// Returns false if it did not exist.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;
    /// Meetings organized or attended by any of `participant_ids` whose start
    /// lies in `[start, end]`, ordered by start.
    async fn find_by_participants_and_date_range(
        &self,
        participant_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, StoreError>;
    async fn find_by_organizer(&self, user_id: &str) -> Result<Vec<Meeting>, StoreError>;
    async fn find_by_attendee_excluding_organizer(
        &self,
        user_id: &str,
    ) -> Result<Vec<Meeting>, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Notification>, StoreError>;
    /// Newest first.
    async fn find_by_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError>;
    /// Returns false if no such notification exists.
    async fn mark_read(&self, id: &str) -> Result<bool, StoreError>;
    /// Returns the number of notifications flipped to read.
    async fn mark_all_read_for_recipient(&self, recipient_id: &str) -> Result<usize, StoreError>;
}
