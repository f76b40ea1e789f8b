use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::AppState;
use crate::entity::Role;
use crate::error::AppResult;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub signed_in: bool,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub last_update: Option<DateTime<Utc>>,
    pub sensors: usize,
    pub alerts: usize,
    pub unresolved_alerts: usize,
    pub logs: usize,
}

async fn session_response(state: &AppState) -> SessionResponse {
    let session = state.sync.snapshot().await;
    let auth = session.auth.as_ref();
    SessionResponse {
        signed_in: auth.is_some(),
        user_id: auth.map(|a| a.user_id),
        email: auth.and_then(|a| a.email.clone()),
        role: session.profile.as_ref().map(|p| p.role),
        is_admin: session.is_admin(),
    }
}

/// Current session
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
    ),
    tag = "auth"
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(session_response(&state).await)
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/sign-in",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Credentials rejected"),
    ),
    tag = "auth"
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<SessionResponse>> {
    state
        .sync
        .sign_in(credentials.email.trim(), &credentials.password)
        .await?;
    Ok(Json(session_response(&state).await))
}

/// Register a new account
///
/// The platform may require email confirmation before the account can sign in.
#[utoipa::path(
    post,
    path = "/api/auth/sign-up",
    request_body = Credentials,
    responses(
        (status = 202, description = "Registration submitted"),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Registration refused"),
    ),
    tag = "auth"
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<StatusCode> {
    state
        .sync
        .sign_up(&credentials.email, &credentials.password)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// Sign out
#[utoipa::path(
    post,
    path = "/api/auth/sign-out",
    responses(
        (status = 200, description = "Signed out", body = SessionResponse),
        (status = 401, description = "Sign-out refused"),
    ),
    tag = "auth"
)]
pub async fn sign_out(State(state): State<AppState>) -> AppResult<Json<SessionResponse>> {
    state.sync.sign_out().await?;
    Ok(Json(session_response(&state).await))
}

/// Refresh sensors, alerts and logs now, with retries
#[utoipa::path(
    post,
    path = "/api/refresh",
    responses(
        (status = 200, description = "Refreshed", body = RefreshResponse),
        (status = 502, description = "Refresh failed after retries"),
    ),
    tag = "session"
)]
pub async fn refresh(State(state): State<AppState>) -> AppResult<Json<RefreshResponse>> {
    state.sync.refresh_all_with_retry().await?;

    let session = state.sync.snapshot().await;
    Ok(Json(RefreshResponse {
        last_update: session.last_update,
        sensors: session.sensors.len(),
        alerts: session.alerts.len(),
        unresolved_alerts: session.unresolved_alert_count(),
        logs: session.logs.len(),
    }))
}
