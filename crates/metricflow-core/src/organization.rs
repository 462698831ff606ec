//! Organizations: the tenancy and billing root.
//!
//! Plan state lives directly on the organization. It only changes through
//! [`Organization::apply_subscription`] and [`Organization::clear_subscription`],
//! which are driven by billing notifications.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;
use crate::OrganizationId;

// ============================================================================
// Constants
// ============================================================================

/// Ingestion ceiling for the free plan.
pub const FREE_PLAN_RATE_LIMIT: i64 = 1_000;

/// Ingestion ceiling for the pro plan.
pub const PRO_PLAN_RATE_LIMIT: i64 = 100_000;

/// Ingestion ceiling for the enterprise plan.
pub const ENTERPRISE_PLAN_RATE_LIMIT: i64 = 10_000_000;

/// An organization (tenant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Organization ID.
    pub id: OrganizationId,

    /// Display name.
    pub name: String,

    /// URL slug, unique and immutable after creation.
    pub slug: String,

    /// Current billing plan.
    pub plan: Plan,

    /// Stripe customer reference.
    pub stripe_customer_id: Option<String>,

    /// Stripe subscription reference.
    pub stripe_subscription_id: Option<String>,

    /// Stripe price attached to the subscription.
    pub stripe_price_id: Option<String>,

    /// End of the current billing period.
    pub stripe_current_period_end: Option<DateTime<Utc>>,

    /// Accepted ingestion requests. Only ever incremented by ingestion.
    pub api_request_count: i64,

    /// Ingestion ceiling.
    pub api_rate_limit: i64,

    /// When the organization was created.
    pub created_at: DateTime<Utc>,

    /// When the organization was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization on the free plan.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `name` or `slug` if either is malformed.
    pub fn new(name: &str, slug: &str) -> Result<Self, ValidationError> {
        validation::min_len("name", name, 2)?;
        validation::slug("slug", slug)?;

        let now = Utc::now();
        Ok(Self {
            id: OrganizationId::generate(),
            name: name.to_string(),
            slug: slug.to_string(),
            plan: Plan::Free,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_price_id: None,
            stripe_current_period_end: None,
            api_request_count: 0,
            api_rate_limit: Plan::Free.default_rate_limit(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether another ingestion request may be accepted.
    #[must_use]
    pub fn has_quota_remaining(&self) -> bool {
        self.api_request_count < self.api_rate_limit
    }

    /// Overwrite billing state with a subscription snapshot.
    ///
    /// The snapshot fully replaces the previous values, so applying the same
    /// snapshot twice leaves the organization unchanged. A `None` customer keeps
    /// the customer already on file.
    pub fn apply_subscription(&mut self, snapshot: &SubscriptionSnapshot) {
        self.plan = snapshot.plan;
        if let Some(customer) = &snapshot.customer_id {
            self.stripe_customer_id = Some(customer.clone());
        }
        self.stripe_subscription_id = Some(snapshot.subscription_id.clone());
        self.stripe_price_id.clone_from(&snapshot.price_id);
        self.stripe_current_period_end = snapshot.current_period_end;
        self.api_rate_limit = snapshot.plan.default_rate_limit();
    }

    /// Drop back to the free plan after a subscription ends.
    ///
    /// The customer reference is kept so a later checkout reuses it.
    pub fn clear_subscription(&mut self) {
        self.plan = Plan::Free;
        self.stripe_subscription_id = None;
        self.stripe_price_id = None;
        self.stripe_current_period_end = None;
        self.api_rate_limit = Plan::Free.default_rate_limit();
    }
}

/// The billing fields carried by a subscription notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Plan resolved from the subscription's price.
    pub plan: Plan,
    /// Stripe customer, when the notification carries one.
    pub customer_id: Option<String>,
    /// Stripe subscription.
    pub subscription_id: String,
    /// Stripe price of the first subscription item.
    pub price_id: Option<String>,
    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Available billing plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    /// No active subscription.
    Free,
    /// Paid subscription on the pro price.
    Pro,
    /// Paid subscription on the enterprise price.
    Enterprise,
}

impl Plan {
    /// Resolve the paid plan for a subscription price.
    ///
    /// Any price other than the configured enterprise price maps to `Pro`.
    #[must_use]
    pub fn from_price(price_id: Option<&str>, enterprise_price_id: Option<&str>) -> Self {
        match (price_id, enterprise_price_id) {
            (Some(price), Some(enterprise)) if price == enterprise => Self::Enterprise,
            _ => Self::Pro,
        }
    }

    /// The ingestion ceiling granted by this plan.
    #[must_use]
    pub const fn default_rate_limit(self) -> i64 {
        match self {
            Self::Free => FREE_PLAN_RATE_LIMIT,
            Self::Pro => PRO_PLAN_RATE_LIMIT,
            Self::Enterprise => ENTERPRISE_PLAN_RATE_LIMIT,
        }
    }

    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
            Self::Enterprise => "ENTERPRISE",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(Self::Free),
            "PRO" => Ok(Self::Pro),
            "ENTERPRISE" => Ok(Self::Enterprise),
            other => Err(ValidationError::new("plan", format!("unknown plan '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pro_snapshot() -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            plan: Plan::Pro,
            customer_id: Some("cus_1".into()),
            subscription_id: "sub_1".into(),
            price_id: Some("price_pro".into()),
            current_period_end: DateTime::from_timestamp(1_800_000_000, 0),
        }
    }

    #[test]
    fn new_organization_starts_free() {
        let org = Organization::new("Acme", "acme").unwrap();
        assert_eq!(org.plan, Plan::Free);
        assert_eq!(org.api_request_count, 0);
        assert_eq!(org.api_rate_limit, FREE_PLAN_RATE_LIMIT);
        assert!(org.stripe_subscription_id.is_none());
    }

    #[test]
    fn new_organization_rejects_bad_slug() {
        let err = Organization::new("Acme", "Acme Inc").unwrap_err();
        assert_eq!(err.field, "slug");
    }

    #[test]
    fn quota_is_exhausted_at_the_limit() {
        let mut org = Organization::new("Acme", "acme").unwrap();
        org.api_rate_limit = 2;
        org.api_request_count = 1;
        assert!(org.has_quota_remaining());
        org.api_request_count = 2;
        assert!(!org.has_quota_remaining());
    }

    #[test]
    fn applying_a_snapshot_twice_is_idempotent() {
        let mut org = Organization::new("Acme", "acme").unwrap();
        org.apply_subscription(&pro_snapshot());
        let once = org.clone();
        org.apply_subscription(&pro_snapshot());
        assert_eq!(org, once);
        assert_eq!(org.plan, Plan::Pro);
        assert_eq!(org.api_rate_limit, PRO_PLAN_RATE_LIMIT);
    }

    #[test]
    fn clearing_keeps_customer_reference() {
        let mut org = Organization::new("Acme", "acme").unwrap();
        org.apply_subscription(&pro_snapshot());
        org.clear_subscription();
        assert_eq!(org.plan, Plan::Free);
        assert_eq!(org.stripe_customer_id.as_deref(), Some("cus_1"));
        assert!(org.stripe_subscription_id.is_none());
        assert!(org.stripe_price_id.is_none());
        assert!(org.stripe_current_period_end.is_none());
    }

    #[test]
    fn enterprise_price_resolves_enterprise() {
        assert_eq!(
            Plan::from_price(Some("price_ent"), Some("price_ent")),
            Plan::Enterprise
        );
        assert_eq!(Plan::from_price(Some("price_pro"), Some("price_ent")), Plan::Pro);
        assert_eq!(Plan::from_price(None, Some("price_ent")), Plan::Pro);
        assert_eq!(Plan::from_price(Some("price_ent"), None), Plan::Pro);
    }

    #[test]
    fn plan_wire_format() {
        assert_eq!(serde_json::to_string(&Plan::Enterprise).unwrap(), "\"ENTERPRISE\"");
        assert_eq!("PRO".parse::<Plan>().unwrap(), Plan::Pro);
        assert!("GOLD".parse::<Plan>().is_err());
    }
}
