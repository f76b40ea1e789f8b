use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::AppState;
use crate::sync::ChannelStatus;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub last_update: Option<DateTime<Utc>>,
    pub channels: Vec<ChannelStatus>,
}

/// Health check endpoint
///
/// Returns 200 OK while the synchronizer is running and 503 once it has been
/// disposed. Channel states are informational; a closed channel does not make
/// the service unhealthy because polling still keeps the session current.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Synchronizer stopped", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let alive = state.sync.is_alive();
    let response = HealthResponse {
        status: if alive { "ok" } else { "stopped" }.to_string(),
        last_update: state.sync.last_update().await,
        channels: state.sync.channel_statuses().await,
    };
    let code = if alive {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
