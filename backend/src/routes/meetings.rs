use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::meeting::{Meeting, MeetingPatch, NewMeeting, UserMeetings};
use crate::AppState;

async fn create_meeting(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<NewMeeting>,
) -> Result<(StatusCode, Json<Meeting>)> {
    let meeting = state.meeting_service.create(body, &auth.id).await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

async fn list_meetings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserMeetings>> {
    Ok(Json(state.meeting_service.list_for_user(&auth.id).await?))
}

async fn get_meeting(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Meeting>> {
    Ok(Json(state.meeting_service.get_by_id(&id).await?))
}

async fn update_meeting(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<MeetingPatch>,
) -> Result<Json<Meeting>> {
    Ok(Json(state.meeting_service.update(&id, patch, &auth.id).await?))
}

async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.meeting_service.delete(&id, &auth.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/meetings", get(list_meetings).post(create_meeting))
        .route(
            "/meetings/:id",
            get(get_meeting).patch(update_meeting).delete(delete_meeting),
        )
        .with_state(state)
}
