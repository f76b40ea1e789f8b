//! HTTP surface over an in-memory platform.
//!
//! Run with: cargo test --test api_test

mod support;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use coldwatch::common::AppState;
use coldwatch::config::Config;
use coldwatch::entity::{AlertKind, AlertStatus};
use coldwatch::routes::build_router;
use coldwatch::supabase::DisabledChangeFeed;
use coldwatch::sync::FixedReadings;

use support::{freezer, Harness, ADMIN_EMAIL, PASSWORD};

async fn app() -> (Harness, Router) {
    let h = Harness::new(
        vec![freezer(1, "Freezer A", -18.0), freezer(2, "Freezer B", -14.0)],
        FixedReadings::default(),
        Arc::new(DisabledChangeFeed),
    );
    h.store.add_alert(2, AlertKind::High, -14.0, AlertStatus::Unresolved);
    h.sync.initial_load().await.unwrap();

    let config = Config::with_platform("http://localhost:54321", "anon");
    let router = build_router(AppState::new(config, h.sync.clone()));
    (h, router)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_channels() {
    let (_h, router) = app().await;

    let (status, body) = send(&router, Method::GET, "/healthz", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["channels"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn sensors_carry_display_status() {
    let (_h, router) = app().await;

    let (status, body) = send(&router, Method::GET, "/api/sensors", None).await;

    assert_eq!(status, StatusCode::OK);
    let sensors = json_body(&body);
    assert_eq!(sensors[0]["name"], "Freezer A");
    assert_eq!(sensors[0]["display_status"], "active");
    assert_eq!(sensors[1]["display_status"], "warning");
    assert_eq!(sensors[1]["out_of_range"], true);
}

#[tokio::test]
async fn alerts_and_count() {
    let (_h, router) = app().await;

    let (_, body) = send(&router, Method::GET, "/api/alerts?status=unresolved", None).await;
    let alerts = json_body(&body);
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["sensor"], "Freezer B");
    assert_eq!(alerts[0]["type"], "high");

    let (_, body) = send(&router, Method::GET, "/api/alerts/unresolved-count", None).await;
    assert_eq!(json_body(&body)["unresolved"], 1);
}

#[tokio::test]
async fn writes_map_errors_to_statuses() {
    let (_h, router) = app().await;
    let thresholds = json!({"min_threshold": -10.0, "max_threshold": -20.0});

    let (status, _) = send(&router, Method::PUT, "/api/sensors/1/thresholds", Some(thresholds.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/auth/sign-in",
        Some(json!({"email": ADMIN_EMAIL, "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/auth/sign-in",
        Some(json!({"email": ADMIN_EMAIL, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["is_admin"], true);

    let (status, body) = send(&router, Method::PUT, "/api/sensors/1/thresholds", Some(thresholds)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("sensor 1"));

    let (status, _) = send(&router, Method::POST, "/api/alerts/404/resolve", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chart_rejects_unknown_range() {
    let (_h, router) = app().await;

    let (status, _) = send(&router, Method::GET, "/api/chart?range=2w", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&router, Method::GET, "/api/chart?range=7d", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["bucket_width_minutes"], 360);
}

#[tokio::test]
async fn exports_have_one_row_per_alert() {
    let (_h, router) = app().await;

    let (status, body) = send(&router, Method::GET, "/api/export/alerts.csv", None).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(body).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("Freezer B"));

    let (status, body) = send(&router, Method::GET, "/api/export/alerts.html", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("Total alerts: 1"));
}
