//! Health endpoint tests.

mod common;

use serde_json::Value;

use common::TestHarness;

#[tokio::test]
async fn health_check_returns_ok() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "metricflow");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/api/does-not-exist")
        .await
        .assert_status_not_found();
}
