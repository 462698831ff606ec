//! Ingestion API integration tests.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use futures::future::join_all;
use serde_json::{json, Value};

use common::{api_key_header, key_value, TestHarness};
use metricflow_core::{ApiKey, Project};
use metricflow_store::Store;

fn page_view(project_id: &str) -> Value {
    json!({
        "name": "landing",
        "type": "PAGE_VIEW",
        "projectId": project_id,
        "properties": { "path": "/pricing" },
        "country": "NL"
    })
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn ingest_returns_created_event() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let response = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .json(&page_view(&tenant.project.id.to_string()))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["name"], "landing");
    assert_eq!(body["type"], "PAGE_VIEW");
    assert_eq!(body["properties"]["path"], "/pricing");
    assert!(body["timestamp"].is_string());

    assert_eq!(harness.organization(&tenant).await.api_request_count, 1);
}

#[tokio::test]
async fn ingested_event_can_be_fetched_by_id() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let created: Value = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .json(&json!({
            "name": "checkout",
            "type": "PURCHASE",
            "projectId": tenant.project.id.to_string(),
            "revenue": 49.5,
            "externalUserId": "u-1"
        }))
        .await
        .json();

    let id = created["id"].as_str().unwrap();
    let response = harness
        .server
        .get(&format!("/api/v1/events/{id}"))
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), created);
}

#[tokio::test]
async fn quota_is_enforced_at_the_limit() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    harness.leave_quota(&tenant, 2).await;
    let payload = page_view(&tenant.project.id.to_string());

    for _ in 0..2 {
        harness
            .server
            .post("/api/v1/events")
            .add_header(api_key_header(), key_value(&tenant.api_key))
            .json(&payload)
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .json(&payload)
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["error"]["code"], "rate_limit_exceeded");

    let org = harness.organization(&tenant).await;
    assert_eq!(org.api_request_count, org.api_rate_limit);
    let stored = harness
        .store
        .count_events(&tenant.organization.id, &Default::default())
        .await
        .unwrap();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn concurrent_ingestion_overshoots_by_at_most_in_flight() {
    const IN_FLIGHT: usize = 8;

    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    harness.leave_quota(&tenant, 1).await;
    let payload = page_view(&tenant.project.id.to_string());

    let requests = (0..IN_FLIGHT).map(|_| {
        harness
            .server
            .post("/api/v1/events")
            .add_header(api_key_header(), key_value(&tenant.api_key))
            .json(&payload)
    });
    let responses = join_all(requests.map(|r| async move { r.await })).await;

    let accepted = responses
        .iter()
        .filter(|r| r.status_code() == StatusCode::CREATED)
        .count();
    let limited = responses
        .iter()
        .filter(|r| r.status_code() == StatusCode::TOO_MANY_REQUESTS)
        .count();
    assert!(accepted >= 1);
    assert_eq!(accepted + limited, IN_FLIGHT);

    let org = harness.organization(&tenant).await;
    assert_eq!(org.api_request_count, org.api_rate_limit - 1 + accepted as i64);
    assert!(org.api_request_count <= org.api_rate_limit + IN_FLIGHT as i64 - 1);
}

#[tokio::test]
async fn unknown_event_type_names_the_field() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let response = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .json(&json!({
            "name": "x",
            "type": "UNKNOWN_TYPE",
            "projectId": tenant.project.id.to_string()
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["details"]["field"], "type");
    assert_eq!(harness.organization(&tenant).await.api_request_count, 0);
}

#[tokio::test]
async fn first_invalid_field_is_reported() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let response = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .json(&json!({ "type": 7 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["details"]["field"], "name");
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let response = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["details"]["field"], "body");
}

#[tokio::test]
async fn project_of_another_tenant_is_not_found() {
    let harness = TestHarness::new();
    let acme = harness.tenant("acme").await;
    let globex = harness.tenant("globex").await;

    let response = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&acme.api_key))
        .json(&page_view(&globex.project.id.to_string()))
        .await;

    response.assert_status_not_found();
    assert_eq!(harness.organization(&acme).await.api_request_count, 0);
    assert_eq!(harness.organization(&globex).await.api_request_count, 0);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn missing_unknown_and_expired_keys_look_identical() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    let payload = page_view(&tenant.project.id.to_string());

    let (mut expired, expired_secret) = ApiKey::generate(tenant.organization.id, "old", None);
    expired.expires_at = Some(Utc::now() - Duration::minutes(1));
    harness.store.create_api_key(&expired).await.unwrap();

    let missing = harness.server.post("/api/v1/events").json(&payload).await;
    let unknown = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value("mk_live_doesnotexist"))
        .json(&payload)
        .await;
    let expired = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&expired_secret))
        .json(&payload)
        .await;

    for response in [&missing, &unknown, &expired] {
        response.assert_status_unauthorized();
    }
    assert_eq!(unknown.text(), expired.text());
    assert_eq!(missing.text(), expired.text());
}

#[tokio::test]
async fn key_usage_is_stamped() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    harness
        .server
        .get("/api/v1/projects")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .await
        .assert_status_ok();

    let mut stamped = false;
    for _ in 0..50 {
        let keys = harness
            .store
            .list_api_keys(&tenant.organization.id)
            .await
            .unwrap();
        if keys[0].last_used_at.is_some() {
            stamped = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(stamped);
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn list_is_newest_first_and_capped() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    for name in ["first", "second", "third"] {
        harness
            .server
            .post("/api/v1/events")
            .add_header(api_key_header(), key_value(&tenant.api_key))
            .json(&json!({
                "name": name,
                "type": "CLICK",
                "projectId": tenant.project.id.to_string()
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let events: Vec<Value> = harness
        .server
        .get("/api/v1/events")
        .add_query_param("limit", 2)
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .await
        .json();
    let names: Vec<&str> = events.iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["third", "second"]);

    let page_two: Vec<Value> = harness
        .server
        .get("/api/v1/events")
        .add_query_param("limit", 2)
        .add_query_param("page", 2)
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .await
        .json();
    assert_eq!(page_two.len(), 1);
    assert_eq!(page_two[0]["name"], "first");
}

#[tokio::test]
async fn events_of_other_tenants_are_invisible() {
    let harness = TestHarness::new();
    let acme = harness.tenant("acme").await;
    let globex = harness.tenant("globex").await;

    let created: Value = harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&globex.api_key))
        .json(&page_view(&globex.project.id.to_string()))
        .await
        .json();

    harness
        .server
        .get(&format!("/api/v1/events/{}", created["id"].as_str().unwrap()))
        .add_header(api_key_header(), key_value(&acme.api_key))
        .await
        .assert_status_not_found();

    let listed: Vec<Value> = harness
        .server
        .get("/api/v1/events")
        .add_header(api_key_header(), key_value(&acme.api_key))
        .await
        .json();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn projects_include_event_counts() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    let empty = Project::new(tenant.organization.id, "Docs", None, None).unwrap();
    harness.store.create_project(&empty).await.unwrap();

    harness
        .server
        .post("/api/v1/events")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .json(&page_view(&tenant.project.id.to_string()))
        .await
        .assert_status(StatusCode::CREATED);

    let projects: Vec<Value> = harness
        .server
        .get("/api/v1/projects")
        .add_header(api_key_header(), key_value(&tenant.api_key))
        .await
        .json();

    assert_eq!(projects.len(), 2);
    let count_of = |name: &str| {
        projects
            .iter()
            .find(|p| p["name"] == name)
            .map(|p| p["eventCount"].as_i64().unwrap())
            .unwrap()
    };
    assert_eq!(count_of("Website"), 1);
    assert_eq!(count_of("Docs"), 0);
}
