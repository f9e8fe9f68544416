use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use meetsync_common::Notification;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::store::{NotificationStore, UserStore};
use crate::AppState;

/// Body of `POST /api/notifications`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendNotificationRequest {
    pub receiver_id: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub meeting_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    pub notification: Notification,
    /// Whether the receiver had a live channel at send time.
    pub delivered: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(state.notifications.find_by_recipient(&auth.id).await?))
}

async fn send_notification(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<SendNotificationResponse>)> {
    if body.title.trim().is_empty() {
        return Err(Error::BadRequest("Notification title is required".to_string()));
    }
    if state.users.find_by_id(&body.receiver_id).await?.is_none() {
        return Err(Error::NotFound("Receiver not found".to_string()));
    }

    let delivery = state
        .dispatcher
        .dispatch(
            &body.receiver_id,
            body.title.trim(),
            &body.message,
            body.meeting_id.as_deref(),
        )
        .await?;
    tracing::debug!("User {} notified {}", auth.id, body.receiver_id);

    Ok((
        StatusCode::CREATED,
        Json(SendNotificationResponse {
            notification: delivery.notification,
            delivered: delivery.pushed,
        }),
    ))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<MarkAllReadResponse>> {
    let updated = state.notifications.mark_all_read_for_recipient(&auth.id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    let mut notification = state
        .notifications
        .find_by_id(&id)
        .await?
        .ok_or_else(|| Error::NotFound("Notification not found".to_string()))?;
    if notification.recipient_id != auth.id {
        return Err(Error::Forbidden(
            "Only the recipient may mark a notification read".to_string(),
        ));
    }

    if !notification.is_read {
        state.notifications.mark_read(&id).await?;
        notification.is_read = true;
    }
    Ok(Json(notification))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).post(send_notification),
        )
        .route("/notifications/read", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
        .with_state(state)
}
