//! Application state.

use std::sync::Arc;

use metricflow_core::{ActivityLog, Notification};
use metricflow_store::Store;

use crate::billing::BillingProvider;
use crate::config::ServiceConfig;
use crate::mailer::{Email, Mailer, ResendMailer};
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Payment processor (optional).
    pub billing: Option<Arc<dyn BillingProvider>>,

    /// Email delivery (optional).
    pub mailer: Option<Arc<dyn Mailer>>,
}

impl AppState {
    /// Create a new application state, building external clients from config.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        // Create Stripe client if configured
        let billing = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client) as Arc<dyn BillingProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if billing.is_none() {
            tracing::warn!("Stripe not configured - billing will not be available");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be rejected");
        }

        // Create Resend client if configured
        let mailer = config.resend_api_key.as_ref().and_then(|key| {
            match ResendMailer::new(key, config.email_from.clone()) {
                Ok(client) => {
                    tracing::info!("Resend email delivery enabled");
                    Some(Arc::new(client) as Arc<dyn Mailer>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Resend client");
                    None
                }
            }
        });

        if mailer.is_none() {
            tracing::warn!("RESEND_API_KEY not configured - emails will not be sent");
        }

        Self {
            store,
            config,
            billing,
            mailer,
        }
    }

    /// Replace the payment processor.
    #[must_use]
    pub fn with_billing(mut self, billing: Arc<dyn BillingProvider>) -> Self {
        self.billing = Some(billing);
        self
    }

    /// Replace the mailer.
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Send an email, logging instead of failing.
    pub async fn send_email(&self, email: Email) {
        let Some(mailer) = &self.mailer else {
            tracing::debug!(subject = %email.subject, "Mailer not configured, skipping email");
            return;
        };
        if let Err(e) = mailer.send(&email).await {
            tracing::warn!(error = %e, subject = %email.subject, "Failed to send email");
        }
    }

    /// Append to the organization's activity log, logging instead of failing.
    pub async fn record_activity(&self, entry: ActivityLog) {
        if let Err(e) = self.store.record_activity(&entry).await {
            tracing::warn!(
                error = %e,
                org_id = %entry.organization_id,
                action = %entry.action,
                "Failed to record activity"
            );
        }
    }

    /// Store a notification, logging instead of failing.
    pub async fn notify(&self, notification: Notification) {
        if let Err(e) = self.store.create_notification(&notification).await {
            tracing::warn!(error = %e, user_id = %notification.user_id, "Failed to store notification");
        }
    }
}
