//! Stripe webhook reconciler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use metricflow_core::{OrganizationId, Plan, SubscriptionSnapshot};

use crate::billing::BillingNotification;
use crate::crypto::verify_stripe_signature;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{Subscription, WebhookEvent};

/// Header carrying the Stripe signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle Stripe webhooks.
///
/// The signature is verified against the raw body before anything is parsed.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let Some(secret) = &state.config.stripe_webhook_secret else {
        tracing::warn!("Stripe webhook received but no webhook secret is configured");
        return Err(ApiError::SignatureInvalid);
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::SignatureInvalid)?;

    verify_stripe_signature(
        &body,
        signature,
        secret,
        state.config.webhook_tolerance_seconds,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Invalid Stripe webhook signature");
        ApiError::SignatureInvalid
    })?;

    let event: WebhookEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    match BillingNotification::from_event(event).map_err(ApiError::BadRequest)? {
        BillingNotification::CheckoutCompleted {
            organization_id,
            subscription_id,
            customer_id,
        } => {
            let (Some(organization_id), Some(subscription_id)) = (organization_id, subscription_id)
            else {
                tracing::info!("Checkout session without organization or subscription, ignoring");
                return Ok(Json(WebhookResponse { received: true }));
            };
            handle_checkout_completed(&state, organization_id, &subscription_id, customer_id)
                .await?;
        }
        BillingNotification::SubscriptionUpdated(subscription) => {
            handle_subscription_updated(&state, &subscription).await?;
        }
        BillingNotification::SubscriptionDeleted { subscription_id } => {
            handle_subscription_deleted(&state, &subscription_id).await?;
        }
        BillingNotification::Ignored { event_type } => {
            tracing::debug!(event_type = %event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

fn snapshot_for(
    state: &AppState,
    subscription: &Subscription,
    customer_id: Option<String>,
) -> SubscriptionSnapshot {
    let price_id = subscription.price_id();
    SubscriptionSnapshot {
        plan: Plan::from_price(price_id, state.config.stripe_enterprise_price_id.as_deref()),
        customer_id,
        subscription_id: subscription.id.clone(),
        price_id: price_id.map(str::to_string),
        current_period_end: subscription.period_end(),
    }
}

/// Move an organization onto the plan it just paid for.
async fn handle_checkout_completed(
    state: &AppState,
    organization_id: OrganizationId,
    subscription_id: &str,
    customer_id: Option<String>,
) -> Result<(), ApiError> {
    let billing = state
        .billing
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("Stripe not configured".into()))?;

    let subscription = billing
        .retrieve_subscription(subscription_id)
        .await
        .map_err(|e| ApiError::ExternalService(e.to_string()))?;

    let customer_id = customer_id.or_else(|| subscription.customer.clone());
    let snapshot = snapshot_for(state, &subscription, customer_id);

    if state
        .store
        .apply_checkout(&organization_id, &snapshot)
        .await?
    {
        tracing::info!(
            org_id = %organization_id,
            plan = %snapshot.plan,
            subscription_id = %snapshot.subscription_id,
            "Subscription activated"
        );
    } else {
        tracing::warn!(org_id = %organization_id, "Checkout completed for unknown organization");
    }

    Ok(())
}

async fn handle_subscription_updated(
    state: &AppState,
    subscription: &Subscription,
) -> Result<(), ApiError> {
    let snapshot = snapshot_for(state, subscription, None);
    let updated = state.store.update_subscription(&snapshot).await?;

    if updated == 0 {
        tracing::debug!(subscription_id = %subscription.id, "No organization for subscription");
    } else {
        tracing::info!(
            subscription_id = %subscription.id,
            plan = %snapshot.plan,
            "Subscription updated"
        );
    }

    Ok(())
}

async fn handle_subscription_deleted(
    state: &AppState,
    subscription_id: &str,
) -> Result<(), ApiError> {
    let reset = state.store.cancel_subscription(subscription_id).await?;

    tracing::info!(
        subscription_id = %subscription_id,
        organizations = reset,
        "Subscription cancelled"
    );

    Ok(())
}
