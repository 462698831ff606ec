//! Stripe webhook reconciler integration tests.

mod common;

use axum::http::{HeaderValue, StatusCode};
use serde_json::{json, Value};

use common::{sign, signature_header, Tenant, TestHarness, ENTERPRISE_PRICE, PRO_PRICE};
use metricflow_core::{Plan, ENTERPRISE_PLAN_RATE_LIMIT, FREE_PLAN_RATE_LIMIT, PRO_PLAN_RATE_LIMIT};

const PERIOD_END: i64 = 1_900_000_000;

fn checkout_completed(tenant: &Tenant, subscription: &str) -> String {
    json!({
        "id": "evt_checkout",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_1",
            "customer": "cus_1",
            "subscription": subscription,
            "metadata": { "organizationId": tenant.organization.id.to_string() }
        } }
    })
    .to_string()
}

fn subscription_event(event_type: &str, subscription: &str, price: &str) -> String {
    json!({
        "id": "evt_sub",
        "type": event_type,
        "data": { "object": {
            "id": subscription,
            "customer": "cus_1",
            "items": { "data": [{ "price": { "id": price }, "current_period_end": PERIOD_END + 100 }] }
        } }
    })
    .to_string()
}

async fn deliver(harness: &TestHarness, payload: &str) -> axum_test::TestResponse {
    harness
        .server
        .post("/api/billing/webhook")
        .add_header(signature_header(), sign(payload))
        .text(payload.to_string())
        .await
}

async fn subscribe(harness: &TestHarness, tenant: &Tenant, price: &str) {
    harness
        .billing
        .add_subscription("sub_1", "cus_1", price, PERIOD_END);
    deliver(harness, &checkout_completed(tenant, "sub_1"))
        .await
        .assert_status_ok();
}

// ============================================================================
// Signature verification
// ============================================================================

#[tokio::test]
async fn missing_signature_is_rejected_without_changes() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    harness
        .billing
        .add_subscription("sub_1", "cus_1", PRO_PRICE, PERIOD_END);

    let response = harness
        .server
        .post("/api/billing/webhook")
        .text(checkout_completed(&tenant, "sub_1"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "invalid_signature");
    assert_eq!(harness.organization(&tenant).await.plan, Plan::Free);
}

#[tokio::test]
async fn forged_signature_is_rejected_without_changes() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    harness
        .billing
        .add_subscription("sub_1", "cus_1", PRO_PRICE, PERIOD_END);
    let payload = checkout_completed(&tenant, "sub_1");

    let signed_for_other_body = sign("{}");
    let response = harness
        .server
        .post("/api/billing/webhook")
        .add_header(signature_header(), signed_for_other_body)
        .text(payload)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.organization(&tenant).await.plan, Plan::Free);
}

#[tokio::test]
async fn stale_signature_is_rejected() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    let payload = checkout_completed(&tenant, "sub_1");
    let old = chrono::Utc::now().timestamp() - 3600;
    let header = metricflow_service::crypto::stripe_signature_header(
        &payload,
        common::WEBHOOK_SECRET,
        old,
    );

    harness
        .server
        .post("/api/billing/webhook")
        .add_header(signature_header(), HeaderValue::from_str(&header).unwrap())
        .text(payload)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_timestamp_is_rejected() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    harness
        .billing
        .add_subscription("sub_1", "cus_1", PRO_PRICE, PERIOD_END);

    let response = harness
        .server
        .post("/api/billing/webhook")
        .add_header(
            signature_header(),
            HeaderValue::from_static("t=-9223372036854775808,v1=ab"),
        )
        .text(checkout_completed(&tenant, "sub_1"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "invalid_signature");
    assert_eq!(harness.organization(&tenant).await.plan, Plan::Free);
}

#[tokio::test]
async fn unconfigured_secret_rejects_everything() {
    let harness = TestHarness::with_config(metricflow_service::ServiceConfig {
        stripe_webhook_secret: None,
        ..common::test_config()
    });
    let tenant = harness.tenant("acme").await;
    let payload = checkout_completed(&tenant, "sub_1");

    deliver(&harness, &payload)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn checkout_moves_organization_to_pro() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    subscribe(&harness, &tenant, PRO_PRICE).await;

    let org = harness.organization(&tenant).await;
    assert_eq!(org.plan, Plan::Pro);
    assert_eq!(org.api_rate_limit, PRO_PLAN_RATE_LIMIT);
    assert_eq!(org.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(org.stripe_subscription_id.as_deref(), Some("sub_1"));
    assert_eq!(org.stripe_price_id.as_deref(), Some(PRO_PRICE));
    assert_eq!(
        org.stripe_current_period_end.map(|t| t.timestamp()),
        Some(PERIOD_END)
    );
}

#[tokio::test]
async fn enterprise_price_selects_enterprise() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    subscribe(&harness, &tenant, ENTERPRISE_PRICE).await;

    let org = harness.organization(&tenant).await;
    assert_eq!(org.plan, Plan::Enterprise);
    assert_eq!(org.api_rate_limit, ENTERPRISE_PLAN_RATE_LIMIT);
}

#[tokio::test]
async fn redelivered_checkout_is_idempotent() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    subscribe(&harness, &tenant, PRO_PRICE).await;
    let once = harness.organization(&tenant).await;

    deliver(&harness, &checkout_completed(&tenant, "sub_1"))
        .await
        .assert_status_ok();
    let twice = harness.organization(&tenant).await;

    assert_eq!(once.plan, twice.plan);
    assert_eq!(once.stripe_customer_id, twice.stripe_customer_id);
    assert_eq!(once.api_rate_limit, twice.api_rate_limit);
    assert_eq!(once.stripe_subscription_id, twice.stripe_subscription_id);
    assert_eq!(once.stripe_price_id, twice.stripe_price_id);
    assert_eq!(once.stripe_current_period_end, twice.stripe_current_period_end);
    assert_eq!(once.api_request_count, twice.api_request_count);
}

#[tokio::test]
async fn checkout_without_metadata_is_acknowledged() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    let payload = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_1", "subscription": "sub_1" } }
    })
    .to_string();

    let response = deliver(&harness, &payload).await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["received"], true);
    assert_eq!(harness.organization(&tenant).await.plan, Plan::Free);
}

#[tokio::test]
async fn processor_failure_leaves_organization_untouched() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    // No subscription registered with the fake processor.
    let response = deliver(&harness, &checkout_completed(&tenant, "sub_missing")).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let org = harness.organization(&tenant).await;
    assert_eq!(org.plan, Plan::Free);
    assert!(org.stripe_subscription_id.is_none());
}

// ============================================================================
// Subscription lifecycle
// ============================================================================

#[tokio::test]
async fn update_refreshes_plan_and_period() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    subscribe(&harness, &tenant, PRO_PRICE).await;

    deliver(
        &harness,
        &subscription_event("customer.subscription.updated", "sub_1", ENTERPRISE_PRICE),
    )
    .await
    .assert_status_ok();

    let org = harness.organization(&tenant).await;
    assert_eq!(org.plan, Plan::Enterprise);
    assert_eq!(org.stripe_price_id.as_deref(), Some(ENTERPRISE_PRICE));
    assert_eq!(
        org.stripe_current_period_end.map(|t| t.timestamp()),
        Some(PERIOD_END + 100)
    );
    assert_eq!(org.stripe_customer_id.as_deref(), Some("cus_1"));
}

#[tokio::test]
async fn update_for_unknown_subscription_is_a_no_op() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    subscribe(&harness, &tenant, PRO_PRICE).await;
    let before = harness.organization(&tenant).await;

    deliver(
        &harness,
        &subscription_event("customer.subscription.updated", "sub_other", ENTERPRISE_PRICE),
    )
    .await
    .assert_status_ok();

    assert_eq!(harness.organization(&tenant).await, before);
}

#[tokio::test]
async fn deletion_resets_to_free_and_keeps_customer() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;
    subscribe(&harness, &tenant, PRO_PRICE).await;

    deliver(
        &harness,
        &subscription_event("customer.subscription.deleted", "sub_1", PRO_PRICE),
    )
    .await
    .assert_status_ok();

    let org = harness.organization(&tenant).await;
    assert_eq!(org.plan, Plan::Free);
    assert_eq!(org.api_rate_limit, FREE_PLAN_RATE_LIMIT);
    assert!(org.stripe_subscription_id.is_none());
    assert!(org.stripe_price_id.is_none());
    assert!(org.stripe_current_period_end.is_none());
    assert_eq!(org.stripe_customer_id.as_deref(), Some("cus_1"));
}

#[tokio::test]
async fn deletion_resets_every_organization_sharing_the_subscription() {
    let harness = TestHarness::new();
    let first = harness.tenant("acme").await;
    let second = harness.tenant("globex").await;
    subscribe(&harness, &first, PRO_PRICE).await;
    subscribe(&harness, &second, PRO_PRICE).await;

    let payload = subscription_event("customer.subscription.deleted", "sub_1", PRO_PRICE);
    deliver(&harness, &payload).await.assert_status_ok();

    for tenant in [&first, &second] {
        let org = harness.organization(tenant).await;
        assert_eq!(org.plan, Plan::Free);
        assert_eq!(org.api_rate_limit, FREE_PLAN_RATE_LIMIT);
        assert!(org.stripe_subscription_id.is_none());
        assert_eq!(org.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    deliver(&harness, &payload).await.assert_status_ok();
    assert_eq!(harness.organization(&first).await.plan, Plan::Free);
}

#[tokio::test]
async fn deletion_without_match_succeeds() {
    let harness = TestHarness::new();
    let tenant = harness.tenant("acme").await;

    let payload = subscription_event("customer.subscription.deleted", "sub_nobody", PRO_PRICE);
    deliver(&harness, &payload).await.assert_status_ok();
    deliver(&harness, &payload).await.assert_status_ok();

    assert_eq!(harness.organization(&tenant).await.plan, Plan::Free);
}

#[tokio::test]
async fn unknown_event_types_are_acknowledged() {
    let harness = TestHarness::new();
    let payload = json!({
        "id": "evt_1",
        "type": "invoice.payment_succeeded",
        "data": { "object": { "id": "in_1" } }
    })
    .to_string();

    let response = deliver(&harness, &payload).await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "received": true }));
}
