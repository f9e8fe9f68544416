use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Stored lower-cased; lookups are case-insensitive.
    pub email: String,
    /// Absent for accounts created through an external identity provider.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// IANA zone name. May be empty for legacy records.
    pub timezone: String,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: &str, timezone: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email: normalize_email(email),
            password_hash: None,
            timezone,
            profile_image: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_timezone(&self) -> bool {
        !self.timezone.trim().is_empty()
    }
}

/// Canonical form used for storing and comparing emails.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Body of `POST /api/users`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// Body of `PATCH /api/users/me/timezone`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimezoneUpdate {
    pub timezone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let user = User::new("Asha".to_string(), "  Asha@Example.COM ", "Asia/Kolkata".to_string());
        assert_eq!(user.email, "asha@example.com");
    }

    #[test]
    fn test_blank_timezone_counts_as_missing() {
        let user = User::new("Bo".to_string(), "bo@example.com", "  ".to_string());
        assert!(!user.has_timezone());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let mut user = User::new("Cy".to_string(), "cy@example.com", "UTC".to_string());
        user.password_hash = Some("secret".to_string());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("password_hash"));
    }
}
