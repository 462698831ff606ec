//! Payment processor seam and billing notifications.
//!
//! Handlers talk to the processor through [`BillingProvider`] so tests can
//! substitute a fake. Verified webhook events are decoded into a closed
//! [`BillingNotification`] set before anything touches the store.

use async_trait::async_trait;
use serde_json::Value;

use metricflow_core::OrganizationId;

use crate::stripe::{CheckoutSession, PortalSession, StripeError, Subscription, WebhookEvent};

/// Parameters for a subscription checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Price the organization is subscribing to.
    pub price_id: String,
    /// Organization the subscription is for, echoed back in webhook metadata.
    pub organization_id: String,
    /// Existing processor customer, reused when present.
    pub customer_id: Option<String>,
    /// Redirect after a completed checkout.
    pub success_url: String,
    /// Redirect after an abandoned checkout.
    pub cancel_url: String,
}

/// Operations MetricFlow needs from the payment processor.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Fetch the current state of a subscription.
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, StripeError>;

    /// Start a subscription checkout.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError>;

    /// Open the self-service billing portal for a customer.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeError>;
}

/// A verified webhook event, reduced to what the reconciler acts on.
#[derive(Debug, Clone)]
pub enum BillingNotification {
    /// `checkout.session.completed`.
    CheckoutCompleted {
        /// `metadata.organizationId`, if present and well-formed.
        organization_id: Option<OrganizationId>,
        /// Subscription created by the checkout.
        subscription_id: Option<String>,
        /// Customer created or reused by the checkout.
        customer_id: Option<String>,
    },
    /// `customer.subscription.updated`.
    SubscriptionUpdated(Subscription),
    /// `customer.subscription.deleted`.
    SubscriptionDeleted {
        /// The cancelled subscription.
        subscription_id: String,
    },
    /// Any other event type.
    Ignored {
        /// The unhandled event type.
        event_type: String,
    },
}

impl BillingNotification {
    /// Decode a webhook event.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when a handled event type carries
    /// an object of the wrong shape.
    pub fn from_event(event: WebhookEvent) -> Result<Self, String> {
        let object = event.data.object;
        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSession = serde_json::from_value(object)
                    .map_err(|e| format!("invalid checkout session: {e}"))?;
                let organization_id = session
                    .metadata
                    .get("organizationId")
                    .and_then(|id| id.parse().ok());
                Ok(Self::CheckoutCompleted {
                    organization_id,
                    subscription_id: session.subscription,
                    customer_id: session.customer,
                })
            }
            "customer.subscription.updated" => serde_json::from_value(object)
                .map(Self::SubscriptionUpdated)
                .map_err(|e| format!("invalid subscription: {e}")),
            "customer.subscription.deleted" => {
                let subscription_id = object
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "subscription without id".to_string())?;
                Ok(Self::SubscriptionDeleted {
                    subscription_id: subscription_id.to_string(),
                })
            }
            other => Ok(Self::Ignored {
                event_type: other.to_string(),
            }),
        }
    }
}
