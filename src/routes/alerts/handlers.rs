use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::common::AppState;
use crate::entity::Alert;
use crate::error::AppResult;
use crate::sync::AlertView;

use super::types::{AlertsQuery, UnresolvedCountResponse};

/// Recent alerts, newest first
#[utoipa::path(
    get,
    path = "/api/alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Alerts retrieved successfully", body = Vec<AlertView>),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Json<Vec<AlertView>> {
    let alerts = state
        .sync
        .alerts()
        .await
        .into_iter()
        .filter(|a| query.status.is_none_or(|s| a.alert.status == s))
        .filter(|a| query.sensor_id.is_none_or(|id| a.alert.sensor_id == id))
        .collect();
    Json(alerts)
}

/// Number of unresolved alerts among the loaded ones
#[utoipa::path(
    get,
    path = "/api/alerts/unresolved-count",
    responses(
        (status = 200, description = "Count computed", body = UnresolvedCountResponse),
    ),
    tag = "alerts"
)]
pub async fn unresolved_count(State(state): State<AppState>) -> Json<UnresolvedCountResponse> {
    Json(UnresolvedCountResponse {
        unresolved: state.sync.unresolved_alert_count().await,
    })
}

/// Resolve an alert
///
/// Requires an administrator session. Resolving an alert that is already
/// resolved reports 404 and leaves it untouched.
#[utoipa::path(
    post,
    path = "/api/alerts/{alert_id}/resolve",
    params(
        ("alert_id" = i64, Path, description = "Alert ID"),
    ),
    responses(
        (status = 200, description = "Alert resolved", body = Alert),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Alert not found or already resolved"),
    ),
    tag = "alerts"
)]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<i64>,
) -> AppResult<Json<Alert>> {
    let alert = state.sync.resolve_alert(alert_id).await?;
    Ok(Json(alert))
}
