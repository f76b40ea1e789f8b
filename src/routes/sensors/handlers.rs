use axum::{
    extract::{Path, State},
    Json,
};

use crate::common::AppState;
use crate::error::AppResult;
use crate::sync::{ThresholdForm, ThresholdSaveReport};

use super::types::{SensorResponse, ThresholdUpdate};

/// List all sensors
#[utoipa::path(
    get,
    path = "/api/sensors",
    responses(
        (status = 200, description = "Sensors retrieved successfully", body = Vec<SensorResponse>),
    ),
    tag = "sensors"
)]
pub async fn list_sensors(State(state): State<AppState>) -> Json<Vec<SensorResponse>> {
    let sensors = state.sync.sensors().await;
    Json(sensors.into_iter().map(SensorResponse::from).collect())
}

/// Update one sensor's thresholds
///
/// Requires an administrator session. The pair is validated before anything
/// is written.
#[utoipa::path(
    put,
    path = "/api/sensors/{sensor_id}/thresholds",
    params(
        ("sensor_id" = i64, Path, description = "Sensor ID"),
    ),
    request_body = ThresholdUpdate,
    responses(
        (status = 200, description = "Thresholds updated", body = SensorResponse),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Sensor not found"),
        (status = 422, description = "Minimum is not below maximum"),
    ),
    tag = "sensors"
)]
pub async fn update_sensor_thresholds(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Json(body): Json<ThresholdUpdate>,
) -> AppResult<Json<SensorResponse>> {
    let sensor = state
        .sync
        .update_threshold(sensor_id, body.min_threshold, body.max_threshold)
        .await?;
    Ok(Json(sensor.into()))
}

/// Save thresholds for several sensors at once
///
/// The whole form is rejected when any pair is invalid. Otherwise every pair
/// is written and per-sensor failures are reported.
#[utoipa::path(
    put,
    path = "/api/thresholds",
    request_body = ThresholdForm,
    responses(
        (status = 200, description = "Form processed", body = ThresholdSaveReport),
        (status = 403, description = "Administrator role required"),
        (status = 422, description = "At least one pair is invalid"),
    ),
    tag = "sensors"
)]
pub async fn save_thresholds(
    State(state): State<AppState>,
    Json(form): Json<ThresholdForm>,
) -> AppResult<Json<ThresholdSaveReport>> {
    let report = state.sync.save_thresholds(&form).await?;
    Ok(Json(report))
}
