//! Stripe API types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Stripe subscription object (the fields MetricFlow reads).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// End of the current period (Unix), on API versions that carry it here.
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Subscription items.
    #[serde(default)]
    pub items: SubscriptionItems,
}

impl Subscription {
    /// Price of the first subscription item.
    #[must_use]
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }

    /// End of the current billing period.
    ///
    /// Newer API versions move this field onto the subscription item.
    #[must_use]
    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .or_else(|| self.items.data.first().and_then(|i| i.current_period_end))
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// Subscription item list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    /// Items.
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// A single subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// The subscribed price.
    pub price: Price,
    /// End of the current period (Unix), on newer API versions.
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe price reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Subscription created by the session.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Metadata set when the session was created.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe billing portal session.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    /// Session ID.
    pub id: String,
    /// Portal URL.
    pub url: String,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscription_reads_price_and_period_end() {
        let sub: Subscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "current_period_end": 1_800_000_000,
            "items": { "data": [{ "price": { "id": "price_pro" } }] }
        }))
        .unwrap();
        assert_eq!(sub.price_id(), Some("price_pro"));
        assert_eq!(sub.period_end().unwrap().timestamp(), 1_800_000_000);
    }

    #[test]
    fn period_end_falls_back_to_item() {
        let sub: Subscription = serde_json::from_value(json!({
            "id": "sub_1",
            "items": { "data": [{ "price": { "id": "p" }, "current_period_end": 1_700_000_000 }] }
        }))
        .unwrap();
        assert_eq!(sub.period_end().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn checkout_session_metadata() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "subscription": "sub_1",
            "metadata": { "organizationId": "org" }
        }))
        .unwrap();
        assert_eq!(session.metadata.get("organizationId").map(String::as_str), Some("org"));
        assert!(session.customer.is_none());
    }
}
