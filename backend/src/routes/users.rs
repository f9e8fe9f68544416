use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::availability::tz;
use crate::error::{Error, Result};
use crate::models::user::{normalize_email, NewUser, TimezoneUpdate, User};
use crate::store::UserStore;
use crate::AppState;

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest("Name is required".to_string()));
    }
    let email = normalize_email(&body.email);
    if !email.contains('@') {
        return Err(Error::BadRequest(format!("Invalid email: {}", body.email)));
    }

    let timezone = match body.timezone.as_deref().map(str::trim) {
        Some(zone) if !zone.is_empty() => valid_zone(zone)?,
        _ => state.config.scheduling.default_timezone.clone(),
    };

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(Error::BadRequest(format!("Email already registered: {}", email)));
    }

    let mut user = User::new(name.to_string(), &email, timezone);
    user.profile_image = body.profile_image.filter(|p| !p.trim().is_empty());
    state.users.insert(&user).await?;
    tracing::info!("Registered user {} ({})", user.id, user.email);

    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(State(state): State<Arc<AppState>>, auth: AuthUser) -> Result<Json<User>> {
    Ok(Json(current_user(&state, &auth).await?))
}

async fn update_timezone(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<TimezoneUpdate>,
) -> Result<Json<User>> {
    let timezone = valid_zone(body.timezone.trim())?;
    if !state.users.update_timezone(&auth.id, &timezone).await? {
        return Err(Error::NotFound("User not found".to_string()));
    }
    tracing::info!("User {} switched timezone to {}", auth.id, timezone);

    Ok(Json(current_user(&state, &auth).await?))
}

async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    state
        .users
        .find_by_id(&auth.id)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))
}

fn valid_zone(zone: &str) -> Result<String> {
    tz::parse_zone(zone)
        .map(|_| zone.to_string())
        .ok_or_else(|| Error::BadRequest(format!("Unknown timezone: {}", zone)))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/me", get(me))
        .route("/users/me/timezone", patch(update_timezone))
        .with_state(state)
}
