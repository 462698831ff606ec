//! Checkout and billing portal integration tests.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{Tenant, TestHarness, PRO_PRICE};
use metricflow_core::{Plan, Role, SubscriptionSnapshot};
use metricflow_store::Store;

async fn subscribe(harness: &TestHarness, tenant: &Tenant, customer: &str, subscription: &str) {
    let snapshot = SubscriptionSnapshot {
        plan: Plan::Pro,
        customer_id: Some(customer.into()),
        subscription_id: subscription.into(),
        price_id: Some(PRO_PRICE.into()),
        current_period_end: None,
    };
    assert!(harness
        .store
        .apply_checkout(&tenant.organization.id, &snapshot)
        .await
        .unwrap());
}

#[tokio::test]
async fn checkout_carries_organization_metadata() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let response = harness
        .server
        .post("/api/billing/checkout")
        .add_header(AUTHORIZATION, harness.session(&tenant.admin))
        .json(&json!({ "priceId": PRO_PRICE }))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["url"],
        "https://checkout.stripe.test/cs_test_1"
    );

    let checkouts = harness.billing.checkouts();
    assert_eq!(checkouts.len(), 1);
    let request = &checkouts[0];
    assert_eq!(request.price_id, PRO_PRICE);
    assert_eq!(request.organization_id, tenant.organization.id.to_string());
    assert!(request.customer_id.is_none());
    assert_eq!(
        request.success_url,
        "http://app.test/dashboard/settings?tab=billing&success=true"
    );
    assert_eq!(request.cancel_url, "http://app.test/dashboard/settings?tab=billing");
}

#[tokio::test]
async fn checkout_reuses_existing_customer() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    subscribe(&harness, &tenant, "cus_existing", "sub_1").await;

    harness
        .server
        .post("/api/billing/checkout")
        .add_header(AUTHORIZATION, harness.session(&tenant.admin))
        .json(&json!({ "priceId": PRO_PRICE }))
        .await
        .assert_status_ok();

    assert_eq!(
        harness.billing.checkouts()[0].customer_id.as_deref(),
        Some("cus_existing")
    );
}

#[tokio::test]
async fn checkout_requires_price_and_admin() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    let editor = harness.member(&tenant, Role::Editor).await;

    let missing = harness
        .server
        .post("/api/billing/checkout")
        .add_header(AUTHORIZATION, harness.session(&tenant.admin))
        .json(&json!({}))
        .await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(missing.json::<Value>()["error"]["details"]["field"], "priceId");

    harness
        .server
        .post("/api/billing/checkout")
        .add_header(AUTHORIZATION, harness.session(&editor))
        .json(&json!({ "priceId": PRO_PRICE }))
        .await
        .assert_status_forbidden();

    assert!(harness.billing.checkouts().is_empty());
}

#[tokio::test]
async fn portal_needs_a_billing_account() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let response = harness
        .server
        .post("/api/billing/portal")
        .add_header(AUTHORIZATION, harness.session(&tenant.admin))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["message"], "No billing account");
}

#[tokio::test]
async fn portal_opens_for_subscribed_organization() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    subscribe(&harness, &tenant, "cus_42", "sub_42").await;

    let response = harness
        .server
        .post("/api/billing/portal")
        .add_header(AUTHORIZATION, harness.session(&tenant.admin))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["url"],
        "https://billing.stripe.test/cus_42"
    );
}

#[tokio::test]
async fn billing_without_processor_is_a_gateway_error() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    let state_without_billing = metricflow_service::AppState::new(
        harness.store.clone(),
        harness.config.clone(),
    );
    let server =
        axum_test::TestServer::new(metricflow_service::create_router(state_without_billing))
            .unwrap();

    server
        .post("/api/billing/checkout")
        .add_header(AUTHORIZATION, harness.session(&tenant.admin))
        .json(&json!({ "priceId": PRO_PRICE }))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}
