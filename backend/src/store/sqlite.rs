use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{MeetingStore, NotificationStore, StoreError, UserStore};
use crate::models::meeting::Meeting;
use crate::models::notification::Notification;
use crate::models::user::{normalize_email, User};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT,
        timezone TEXT NOT NULL DEFAULT '',
        profile_image TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS meetings (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        agenda TEXT,
        kind TEXT NOT NULL,
        location TEXT,
        start_ms INTEGER NOT NULL,
        end_ms INTEGER NOT NULL,
        date TEXT NOT NULL,
        organizer_id TEXT NOT NULL,
        timezone TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (organizer_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS meeting_attendees (
        meeting_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (meeting_id, user_id),
        FOREIGN KEY (meeting_id) REFERENCES meetings(id)
    );

    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        recipient_id TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        meeting_id TEXT,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_meetings_start ON meetings(start_ms);
    CREATE INDEX IF NOT EXISTS idx_meetings_organizer ON meetings(organizer_id);
    CREATE INDEX IF NOT EXISTS idx_attendees_user ON meeting_attendees(user_id);
    CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient_id, created_at);
";

const USER_COLUMNS: &str = "id, name, email, password_hash, timezone, profile_image, created_at";
const MEETING_COLUMNS: &str =
    "id, title, agenda, kind, location, start_ms, end_ms, date, organizer_id, timezone, created_at";
const NOTIFICATION_COLUMNS: &str = "id, recipient_id, title, message, meeting_id, is_read, created_at";

/// SQLite-backed store for users, meetings and notifications.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("Record store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh store that lives only as long as the process.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, timezone, profile_image, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.name,
                normalize_email(&user.email),
                user.password_hash,
                user.timezone,
                user.profile_image,
                format_ts(user.created_at),
            ],
        )?;
        tracing::debug!("Inserted user {} ({})", user.id, user.email);
        Ok(())
    }

    fn user_where(&self, clause: &str, value: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, clause);
        let raw = conn.query_row(&sql, params![value], user_row).optional()?;
        raw.map(UserRow::into_user).transpose()
    }

    fn users_by_emails(&self, emails: &[String]) -> Result<Vec<User>, StoreError> {
        let mut wanted: Vec<String> = emails.iter().map(|e| normalize_email(e)).collect();
        wanted.sort();
        wanted.dedup();
        if wanted.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM users WHERE email IN ({}) ORDER BY email",
            USER_COLUMNS,
            placeholders(wanted.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(wanted.iter()), user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    fn set_timezone(&self, id: &str, timezone: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE users SET timezone = ?1 WHERE id = ?2",
            params![timezone, id],
        )?;
        Ok(changed > 0)
    }

    fn insert_meeting(&self, meeting: &Meeting) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO meetings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                MEETING_COLUMNS
            ),
            params![
                meeting.id,
                meeting.title,
                meeting.agenda,
                meeting.kind.as_str(),
                meeting.location,
                meeting.start_time.timestamp_millis(),
                meeting.end_time.timestamp_millis(),
                meeting.date.to_string(),
                meeting.organizer_id,
                meeting.timezone,
                format_ts(meeting.created_at),
            ],
        )?;
        write_attendees(&tx, &meeting.id, &meeting.attendee_ids)?;
        tx.commit()?;
        tracing::debug!("Inserted meeting {}", meeting.id);
        Ok(())
    }

    fn replace_meeting(&self, id: &str, meeting: &Meeting) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE meetings SET title = ?1, agenda = ?2, kind = ?3, location = ?4,
                start_ms = ?5, end_ms = ?6, date = ?7, timezone = ?8
             WHERE id = ?9",
            params![
                meeting.title,
                meeting.agenda,
                meeting.kind.as_str(),
                meeting.location,
                meeting.start_time.timestamp_millis(),
                meeting.end_time.timestamp_millis(),
                meeting.date.to_string(),
                meeting.timezone,
                id,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        tx.execute(
            "DELETE FROM meeting_attendees WHERE meeting_id = ?1",
            params![id],
        )?;
        write_attendees(&tx, id, &meeting.attendee_ids)?;
        tx.commit()?;
        Ok(true)
    }

    fn remove_meeting(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM meeting_attendees WHERE meeting_id = ?1",
            params![id],
        )?;
        let changed = tx.execute("DELETE FROM meetings WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(changed > 0)
    }

    /// Run a meeting query and attach each row's attendee list.
    fn meetings_query(
        &self,
        sql: &str,
        values: Vec<rusqlite::types::Value>,
    ) -> Result<Vec<Meeting>, StoreError> {
        let conn = self.lock()?;
        let rows = {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), meeting_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|row| {
                let attendees = read_attendees(&conn, &row.id)?;
                row.into_meeting(attendees)
            })
            .collect()
    }

    fn meeting_by_id(&self, id: &str) -> Result<Option<Meeting>, StoreError> {
        let sql = format!("SELECT {} FROM meetings WHERE id = ?", MEETING_COLUMNS);
        let mut found = self.meetings_query(&sql, vec![id.to_string().into()])?;
        Ok(found.pop())
    }

    fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO notifications ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                NOTIFICATION_COLUMNS
            ),
            params![
                notification.id,
                notification.recipient_id,
                notification.title,
                notification.message,
                notification.meeting_id,
                notification.is_read as i32,
                format_ts(notification.created_at),
            ],
        )?;
        tracing::debug!(
            "Stored notification {} for {}",
            notification.id,
            notification.recipient_id
        );
        Ok(())
    }

    fn notifications_where(&self, clause: &str, value: &str) -> Result<Vec<Notification>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM notifications WHERE {} = ?1 ORDER BY created_at DESC, rowid DESC",
            NOTIFICATION_COLUMNS, clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![value], notification_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    fn set_read(&self, clause: &str, value: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "UPDATE notifications SET is_read = 1 WHERE {} = ?1 AND is_read = 0",
            clause
        );
        Ok(conn.execute(&sql, params![value])?)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        self.insert_user(user)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.user_where("id", id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.user_where("email", &normalize_email(email))
    }

    async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<User>, StoreError> {
        self.users_by_emails(emails)
    }

    async fn update_timezone(&self, id: &str, timezone: &str) -> Result<bool, StoreError> {
        self.set_timezone(id, timezone)
    }
}

#[async_trait]
impl MeetingStore for SqliteStore {
    async fn insert(&self, meeting: &Meeting) -> Result<(), StoreError> {
        self.insert_meeting(meeting)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Meeting>, StoreError> {
        self.meeting_by_id(id)
    }

    async fn update_by_id(&self, id: &str, meeting: &Meeting) -> Result<bool, StoreError> {
        self.replace_meeting(id, meeting)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        self.remove_meeting(id)
    }

    async fn find_by_participants_and_date_range(
        &self,
        participant_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, StoreError> {
        if participant_ids.is_empty() {
            return Ok(vec![]);
        }

        let ids = placeholders(participant_ids.len());
        let sql = format!(
            "SELECT {} FROM meetings
             WHERE start_ms >= ? AND start_ms <= ?
               AND (organizer_id IN ({ids})
                    OR id IN (SELECT meeting_id FROM meeting_attendees WHERE user_id IN ({ids})))
             ORDER BY start_ms, id",
            MEETING_COLUMNS,
            ids = ids
        );

        let mut values: Vec<rusqlite::types::Value> = vec![
            start.timestamp_millis().into(),
            end.timestamp_millis().into(),
        ];
        for _ in 0..2 {
            values.extend(participant_ids.iter().map(|id| id.clone().into()));
        }

        self.meetings_query(&sql, values)
    }

    async fn find_by_organizer(&self, user_id: &str) -> Result<Vec<Meeting>, StoreError> {
        let sql = format!(
            "SELECT {} FROM meetings WHERE organizer_id = ? ORDER BY start_ms, id",
            MEETING_COLUMNS
        );
        self.meetings_query(&sql, vec![user_id.to_string().into()])
    }

    async fn find_by_attendee_excluding_organizer(
        &self,
        user_id: &str,
    ) -> Result<Vec<Meeting>, StoreError> {
        let sql = format!(
            "SELECT {} FROM meetings
             WHERE organizer_id != ?1
               AND id IN (SELECT meeting_id FROM meeting_attendees WHERE user_id = ?1)
             ORDER BY start_ms, id",
            MEETING_COLUMNS
        );
        self.meetings_query(&sql, vec![user_id.to_string().into()])
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert(&self, notification: &Notification) -> Result<(), StoreError> {
        self.insert_notification(notification)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        Ok(self.notifications_where("id", id)?.pop())
    }

    async fn find_by_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError> {
        self.notifications_where("recipient_id", recipient_id)
    }

    async fn mark_read(&self, id: &str) -> Result<bool, StoreError> {
        self.set_read("id", id)?;
        let conn = self.lock()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM notifications WHERE id = ?1",
                params![id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    async fn mark_all_read_for_recipient(&self, recipient_id: &str) -> Result<usize, StoreError> {
        self.set_read("recipient_id", recipient_id)
    }
}

struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: Option<String>,
    timezone: String,
    profile_image: Option<String>,
    created_at: String,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            timezone: self.timezone,
            profile_image: self.profile_image,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        timezone: row.get(4)?,
        profile_image: row.get(5)?,
        created_at: row.get(6)?,
    })
}

struct MeetingRow {
    id: String,
    title: String,
    agenda: Option<String>,
    kind: String,
    location: Option<String>,
    start_ms: i64,
    end_ms: i64,
    date: String,
    organizer_id: String,
    timezone: String,
    created_at: String,
}

impl MeetingRow {
    fn into_meeting(self, attendee_ids: Vec<String>) -> Result<Meeting, StoreError> {
        Ok(Meeting {
            kind: self.kind.parse().map_err(StoreError::InvalidRecord)?,
            start_time: from_millis(self.start_ms)?,
            end_time: from_millis(self.end_ms)?,
            date: NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
                .map_err(|e| StoreError::InvalidRecord(format!("meeting date {}: {}", self.date, e)))?,
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            title: self.title,
            agenda: self.agenda,
            location: self.location,
            organizer_id: self.organizer_id,
            attendee_ids,
            timezone: self.timezone,
        })
    }
}

fn meeting_row(row: &Row<'_>) -> rusqlite::Result<MeetingRow> {
    Ok(MeetingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        agenda: row.get(2)?,
        kind: row.get(3)?,
        location: row.get(4)?,
        start_ms: row.get(5)?,
        end_ms: row.get(6)?,
        date: row.get(7)?,
        organizer_id: row.get(8)?,
        timezone: row.get(9)?,
        created_at: row.get(10)?,
    })
}

struct NotificationRow {
    id: String,
    recipient_id: String,
    title: String,
    message: String,
    meeting_id: Option<String>,
    is_read: bool,
    created_at: String,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification, StoreError> {
        Ok(Notification {
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            recipient_id: self.recipient_id,
            title: self.title,
            message: self.message,
            meeting_id: self.meeting_id,
            is_read: self.is_read,
        })
    }
}

fn notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        meeting_id: row.get(4)?,
        is_read: row.get::<_, i32>(5)? != 0,
        created_at: row.get(6)?,
    })
}

fn write_attendees(conn: &Connection, meeting_id: &str, attendee_ids: &[String]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO meeting_attendees (meeting_id, user_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, user_id) in attendee_ids.iter().enumerate() {
        stmt.execute(params![meeting_id, user_id, position as i64])?;
    }
    Ok(())
}

fn read_attendees(conn: &Connection, meeting_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM meeting_attendees WHERE meeting_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map(params![meeting_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRecord(format!("timestamp {}: {}", s, e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::InvalidRecord(format!("instant out of range: {}", ms)))
}
