pub mod alerts;
pub mod chart;
pub mod export;
pub mod health;
pub mod sensors;
pub mod session;
pub mod settings;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        sensors::list_sensors,
        sensors::update_sensor_thresholds,
        sensors::save_thresholds,
        alerts::list_alerts,
        alerts::unresolved_count,
        alerts::resolve_alert,
        chart::get_chart,
        chart::set_range,
        chart::list_logs,
        settings::get_settings,
        settings::update_settings,
        session::get_session,
        session::sign_in,
        session::sign_up,
        session::sign_out,
        session::refresh,
        export::alerts_csv,
        export::alerts_html,
        export::logs_csv,
    ),
    components(
        schemas(
            health::HealthResponse,
            sensors::SensorResponse,
            sensors::ThresholdUpdate,
            alerts::UnresolvedCountResponse,
            chart::ChartResponse,
            chart::RangeRequest,
            session::Credentials,
            session::SessionResponse,
            session::RefreshResponse,
            crate::entity::Alert,
            crate::entity::Sensor,
            crate::entity::Settings,
            crate::entity::TemperatureLog,
            crate::sync::AlertView,
            crate::sync::ThresholdForm,
            crate::sync::ThresholdSaveReport,
            crate::sync::ChannelStatus,
            crate::services::bucketer::TimeRange,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sensors", description = "Sensors and thresholds"),
        (name = "alerts", description = "Threshold alerts"),
        (name = "chart", description = "Temperature chart and logs"),
        (name = "settings", description = "Notification settings"),
        (name = "auth", description = "Dashboard session"),
        (name = "session", description = "Manual refresh"),
        (name = "export", description = "Alert and log exports"),
    ),
    info(
        title = "Coldwatch API",
        description = "Cold-storage temperature monitoring dashboard",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/sensors", get(sensors::list_sensors))
        .route(
            "/sensors/{sensor_id}/thresholds",
            put(sensors::update_sensor_thresholds),
        )
        .route("/thresholds", put(sensors::save_thresholds))
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/unresolved-count", get(alerts::unresolved_count))
        .route("/alerts/{alert_id}/resolve", post(alerts::resolve_alert))
        .route("/chart", get(chart::get_chart))
        .route("/chart/range", put(chart::set_range))
        .route("/logs", get(chart::list_logs))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/refresh", post(session::refresh))
        .route("/auth/session", get(session::get_session))
        .route("/auth/sign-in", post(session::sign_in))
        .route("/auth/sign-up", post(session::sign_up))
        .route("/auth/sign-out", post(session::sign_out))
        .route("/export/alerts.csv", get(export::alerts_csv))
        .route("/export/alerts.html", get(export::alerts_html))
        .route("/export/logs.csv", get(export::logs_csv))
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // 64KB body limit

    // Health check routes
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
