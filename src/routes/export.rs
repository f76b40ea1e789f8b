use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::Response,
};
use chrono::Utc;

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::services::export;

fn attachment(body: String, content_type: &'static str, file_name: &str) -> AppResult<Response> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static(content_type))
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(axum::body::Body::from(body))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Alert history as CSV
#[utoipa::path(
    get,
    path = "/api/export/alerts.csv",
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
    ),
    tag = "export"
)]
pub async fn alerts_csv(State(state): State<AppState>) -> AppResult<Response> {
    let alerts = state.sync.alerts().await;
    let body = export::alerts_csv(&alerts)?;
    tracing::debug!(rows = alerts.len(), "Exported alerts as CSV");
    attachment(
        body,
        "text/csv; charset=utf-8",
        &export::export_file_name("alerts", "csv", Utc::now()),
    )
}

/// Printable alert report
#[utoipa::path(
    get,
    path = "/api/export/alerts.html",
    responses(
        (status = 200, description = "HTML document", content_type = "text/html"),
    ),
    tag = "export"
)]
pub async fn alerts_html(State(state): State<AppState>) -> AppResult<Response> {
    let alerts = state.sync.alerts().await;
    let now = Utc::now();
    let body = export::alerts_html_report(&alerts, now, state.sync.display_offset());
    tracing::debug!(rows = alerts.len(), "Exported alerts as HTML");

    Response::builder()
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )
        .body(axum::body::Body::from(body))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Temperature logs of the selected range as CSV
#[utoipa::path(
    get,
    path = "/api/export/logs.csv",
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
    ),
    tag = "export"
)]
pub async fn logs_csv(State(state): State<AppState>) -> AppResult<Response> {
    let session = state.sync.snapshot().await;
    let body = export::logs_csv(&session.logs, &session.sensors, state.sync.display_offset())?;
    tracing::debug!(rows = session.logs.len(), range = %session.range, "Exported logs as CSV");
    attachment(
        body,
        "text/csv; charset=utf-8",
        &export::export_file_name("temperature-logs", "csv", Utc::now()),
    )
}
