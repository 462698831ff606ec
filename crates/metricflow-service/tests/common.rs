//! Common test utilities for MetricFlow integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;

use metricflow_core::{
    ApiKey, Organization, OrganizationMember, Project, Role, User, UserId,
};
use metricflow_service::auth::{issue_session_token, API_KEY_HEADER};
use metricflow_service::crypto::stripe_signature_header;
use metricflow_service::stripe::{CheckoutSession, PortalSession, StripeError, Subscription};
use metricflow_service::{
    create_router, AppState, BillingProvider, CheckoutRequest, Email, Mailer, MailerError,
    ServiceConfig,
};
use metricflow_store::{MemoryStore, Store};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const ENTERPRISE_PRICE: &str = "price_enterprise";
pub const PRO_PRICE: &str = "price_pro";

/// Payment processor double with canned subscriptions.
#[derive(Default)]
pub struct FakeBilling {
    subscriptions: Mutex<HashMap<String, Subscription>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
}

impl FakeBilling {
    /// Make `retrieve_subscription(id)` return a subscription on `price_id`.
    pub fn add_subscription(&self, id: &str, customer: &str, price_id: &str, period_end: i64) {
        let subscription: Subscription = serde_json::from_value(serde_json::json!({
            "id": id,
            "customer": customer,
            "status": "active",
            "items": { "data": [{ "price": { "id": price_id }, "current_period_end": period_end }] }
        }))
        .unwrap();
        self.subscriptions
            .lock()
            .unwrap()
            .insert(id.to_string(), subscription);
    }

    /// Checkout requests received so far.
    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, StripeError> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| StripeError::Api {
                error_type: "invalid_request_error".into(),
                message: format!("No such subscription: {subscription_id}"),
                code: Some("resource_missing".into()),
            })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        self.checkouts.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: "cs_test_1".into(),
            url: Some("https://checkout.stripe.test/cs_test_1".into()),
            ..CheckoutSession::default()
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        Ok(PortalSession {
            id: "bps_1".into(),
            url: format!("https://billing.stripe.test/{customer_id}"),
        })
    }
}

/// Mailer double that records every message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    /// Messages sent so far.
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages were sent by background tasks.
    pub async fn wait_for(&self, count: usize) -> Vec<Email> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("expected {count} emails, got {}", self.sent().len());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// An organization seeded directly in the store.
pub struct Tenant {
    /// The organization as created.
    pub organization: Organization,
    /// Its founding admin.
    pub admin: UserId,
    /// A project owned by the organization.
    pub project: Project,
    /// Secret of an API key owned by the organization.
    pub api_key: String,
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The backing store, for seeding and assertions.
    pub store: Arc<MemoryStore>,
    /// The payment processor double.
    pub billing: Arc<FakeBilling>,
    /// The mailer double.
    pub mailer: Arc<RecordingMailer>,
    /// The configuration the service runs with.
    pub config: ServiceConfig,
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        jwt_secret: "test-jwt-secret".into(),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        stripe_pro_price_id: Some(PRO_PRICE.into()),
        stripe_enterprise_price_id: Some(ENTERPRISE_PRICE.into()),
        app_url: "http://app.test".into(),
        ..ServiceConfig::default()
    }
}

impl TestHarness {
    /// Create a new test harness with a fresh store.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a harness with a specific configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let billing = Arc::new(FakeBilling::default());
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState::new(store.clone(), config.clone())
            .with_billing(billing.clone())
            .with_mailer(mailer.clone());
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            billing,
            mailer,
            config,
        }
    }

    /// Seed a user without going through registration.
    pub async fn user(&self, email: &str) -> User {
        let user = User::new(email, Some("Test User".into()), "unused-hash".into());
        self.store.create_user(&user).await.unwrap();
        user
    }

    /// Seed an organization with an admin, a project and an API key.
    pub async fn tenant(&self, slug: &str) -> Tenant {
        let admin = self.user(&format!("admin@{slug}.test")).await;
        let organization = Organization::new("Test Org", slug).unwrap();
        self.store
            .create_organization(&organization, &OrganizationMember::founder(organization.id, admin.id))
            .await
            .unwrap();

        let project = Project::new(organization.id, "Website", None, None).unwrap();
        self.store.create_project(&project).await.unwrap();

        let (key, api_key) = ApiKey::generate(organization.id, "default", None);
        self.store.create_api_key(&key).await.unwrap();

        Tenant {
            organization,
            admin: admin.id,
            project,
            api_key,
        }
    }

    /// Add an accepted member with `role` to the tenant's organization.
    pub async fn member(&self, tenant: &Tenant, role: Role) -> UserId {
        let email = format!(
            "{}-member@{}.test",
            role.as_str().to_lowercase(),
            tenant.organization.slug
        );
        let user = self.user(&email).await;
        let invite = OrganizationMember::invite(tenant.organization.id, &email, role);
        self.store.create_invite(&invite).await.unwrap();
        assert!(self.store.accept_invite(&invite.id, &user.id).await.unwrap());
        user.id
    }

    /// Bring the organization to `remaining` requests below its limit.
    pub async fn leave_quota(&self, tenant: &Tenant, remaining: i64) {
        let target = tenant.organization.api_rate_limit - remaining;
        for _ in 0..target {
            self.store
                .increment_api_request_count(&tenant.organization.id)
                .await
                .unwrap();
        }
    }

    /// Current stored organization.
    pub async fn organization(&self, tenant: &Tenant) -> Organization {
        self.store
            .get_organization(&tenant.organization.id)
            .await
            .unwrap()
            .unwrap()
    }

    /// `Authorization` header value for a signed-in user.
    pub fn session(&self, user_id: &UserId) -> HeaderValue {
        let token = issue_session_token(user_id, &self.config.jwt_secret, 3600).unwrap();
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// The API key header name.
pub fn api_key_header() -> HeaderName {
    HeaderName::from_static(API_KEY_HEADER)
}

/// Header value for an API key secret.
pub fn key_value(secret: &str) -> HeaderValue {
    HeaderValue::from_str(secret).unwrap()
}

/// The webhook signature header name.
pub fn signature_header() -> HeaderName {
    HeaderName::from_static("stripe-signature")
}

/// A valid signature for `payload` signed now.
pub fn sign(payload: &str) -> HeaderValue {
    let header = stripe_signature_header(payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
    HeaderValue::from_str(&header).unwrap()
}
