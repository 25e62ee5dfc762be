//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::{json_body, TestApp};

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let body = json_body(app.get("/health").await, StatusCode::OK).await;

    assert_eq!(body["status"], "healthy");
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();

    let body = json_body(app.get("/health/live").await, StatusCode::OK).await;

    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_gateway_counts() {
    let app = TestApp::new();
    let _a = app.connect("alice");
    let _a2 = app.connect("alice");
    let _b = app.connect("bob");

    let body = json_body(app.get("/health/ready").await, StatusCode::OK).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["store"]["backend"], "memory");
    assert_eq!(body["checks"]["gateway"]["active_connections"], 3);
    assert_eq!(body["checks"]["gateway"]["online_identities"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint_is_text() {
    let app = TestApp::new();

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_api_requires_token() {
    let app = TestApp::new();

    let response = app.get("/api/messages/bob").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
