mod common;

use common::TestApp;

#[tokio::test]
async fn test_health_endpoint_success() {
    let app = TestApp::new();
    let server = app.server();

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["cache"]["status"], "ok");
    assert_eq!(json["checks"]["click_buffer"]["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_health_not_rate_limited() {
    let app = TestApp::new();
    let server = app.server();

    let response = server.get("/health").await;

    assert!(response.maybe_header("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_health_degraded_when_click_buffer_full() {
    let app = TestApp::with_click_capacity(1);
    let code = app.create_link("https://example.com", None).await;
    let server = app.server();

    assert_eq!(server.get(&format!("/{code}")).await.status_code(), 307);

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), 503);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["click_buffer"]["status"], "error");
}
