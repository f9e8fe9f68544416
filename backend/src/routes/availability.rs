use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::availability::{Availability, AvailabilityQuery};
use crate::error::{Error, Result};
use crate::AppState;

/// Query string of `GET /api/availability`. Missing fields are reported by
/// the engine rather than by the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityParams {
    #[serde(default)]
    pub date: String,
    /// Comma-separated attendee emails.
    #[serde(default)]
    pub attendees: String,
    /// Organizer user id; the caller when omitted.
    #[serde(default)]
    pub organizer: Option<String>,
    /// Slot length in minutes. Kept raw so a malformed value gets the
    /// regular error body.
    #[serde(default)]
    pub duration: Option<String>,
}

impl AvailabilityParams {
    fn into_query(self, caller: &AuthUser) -> Result<AvailabilityQuery> {
        let duration_minutes = match self.duration.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                Error::BadRequest(format!("Duration must be a whole number of minutes: {}", raw))
            })?),
        };

        Ok(AvailabilityQuery {
            date: self.date,
            attendees: self
                .attendees
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect(),
            organizer: self
                .organizer
                .filter(|o| !o.trim().is_empty())
                .unwrap_or_else(|| caller.id.clone()),
            duration_minutes,
        })
    }
}

async fn availability(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Availability>> {
    let query = params.into_query(&auth)?;
    let result = state.availability.compute_free_slots(&query).await?;
    tracing::debug!(
        "Availability for {} on {}: {} slots",
        query.organizer,
        result.date,
        result.slots.len()
    );
    Ok(Json(result))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/availability", get(availability))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_split_attendees_and_default_organizer() {
        let params = AvailabilityParams {
            date: "2024-06-10".to_string(),
            attendees: " a@x.com, ,b@y.com ".to_string(),
            organizer: None,
            duration: Some(" 30 ".to_string()),
        };
        let caller = AuthUser { id: "me".to_string() };
        let query = params.into_query(&caller).unwrap();

        assert_eq!(query.attendees, vec!["a@x.com", "b@y.com"]);
        assert_eq!(query.organizer, "me");
        assert_eq!(query.duration_minutes, Some(30));
    }

    #[test]
    fn test_explicit_organizer_wins() {
        let params = AvailabilityParams {
            organizer: Some("org-1".to_string()),
            ..Default::default()
        };
        let query = params.into_query(&AuthUser { id: "me".to_string() }).unwrap();
        assert_eq!(query.organizer, "org-1");
        assert!(query.attendees.is_empty());
        assert_eq!(query.duration_minutes, None);
    }

    #[test]
    fn test_malformed_duration_is_bad_request() {
        let params = AvailabilityParams {
            duration: Some("abc".to_string()),
            ..Default::default()
        };
        let result = params.into_query(&AuthUser { id: "me".to_string() });
        match result {
            Err(Error::BadRequest(msg)) => assert!(msg.contains("abc")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
