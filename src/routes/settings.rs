use axum::{extract::State, Json};

use crate::common::AppState;
use crate::entity::Settings;
use crate::error::AppResult;

/// Notification settings
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Settings retrieved successfully", body = Settings),
    ),
    tag = "settings"
)]
pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.sync.settings().await)
}

/// Replace the notification settings
///
/// Requires an administrator session. Blank contact entries are dropped.
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = Settings,
    responses(
        (status = 200, description = "Settings saved", body = Settings),
        (status = 403, description = "Administrator role required"),
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> AppResult<Json<Settings>> {
    let saved = state.sync.update_settings(settings).await?;
    Ok(Json(saved))
}
