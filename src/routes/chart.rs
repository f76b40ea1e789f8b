use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::common::AppState;
use crate::entity::TemperatureLog;
use crate::error::AppResult;
use crate::services::bucketer::{ChartPoint, TimeRange};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChartQuery {
    /// Range to chart; the session's selected range when omitted
    pub range: Option<TimeRange>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RangeRequest {
    pub range: TimeRange,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChartResponse {
    pub range: TimeRange,
    pub bucket_width_minutes: u32,
    /// One object per bucket: `time` plus a `sensor{id}` field per sensor with data
    #[schema(value_type = Vec<Object>)]
    pub points: Vec<ChartPoint>,
}

/// Bucketed chart points
#[utoipa::path(
    get,
    path = "/api/chart",
    params(ChartQuery),
    responses(
        (status = 200, description = "Chart built", body = ChartResponse),
        (status = 400, description = "Unknown range"),
        (status = 502, description = "Logs could not be fetched"),
    ),
    tag = "chart"
)]
pub async fn get_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> AppResult<Json<ChartResponse>> {
    let range = match query.range {
        Some(range) => range,
        None => state.sync.range().await,
    };
    let points = state.sync.chart_for(range).await?;

    Ok(Json(ChartResponse {
        range,
        bucket_width_minutes: range.bucket_width_minutes(),
        points,
    }))
}

/// Select the session's chart range
#[utoipa::path(
    put,
    path = "/api/chart/range",
    request_body = RangeRequest,
    responses(
        (status = 200, description = "Range selected and chart rebuilt", body = ChartResponse),
        (status = 502, description = "Range selected but logs could not be fetched"),
    ),
    tag = "chart"
)]
pub async fn set_range(
    State(state): State<AppState>,
    Json(body): Json<RangeRequest>,
) -> AppResult<Json<ChartResponse>> {
    state.sync.set_range(body.range).await?;
    let points = state.sync.chart_for(body.range).await?;

    Ok(Json(ChartResponse {
        range: body.range,
        bucket_width_minutes: body.range.bucket_width_minutes(),
        points,
    }))
}

/// Raw temperature logs behind the current chart, oldest first
#[utoipa::path(
    get,
    path = "/api/logs",
    responses(
        (status = 200, description = "Logs retrieved successfully", body = Vec<TemperatureLog>),
    ),
    tag = "chart"
)]
pub async fn list_logs(State(state): State<AppState>) -> Json<Vec<TemperatureLog>> {
    Json(state.sync.logs().await)
}
