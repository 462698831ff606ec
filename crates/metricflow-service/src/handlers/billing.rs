//! Subscription checkout and billing portal handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use metricflow_core::Action;

use crate::auth::SessionAuth;
use crate::billing::{BillingProvider, CheckoutRequest};
use crate::error::ApiError;
use crate::handlers::{required, Body};
use crate::state::AppState;

/// Checkout request.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckoutBody {
    /// Price to subscribe to.
    pub price_id: Option<String>,
}

/// Redirect target.
#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    /// Where to send the browser.
    pub url: String,
}

fn billing_provider(state: &AppState) -> Result<&Arc<dyn BillingProvider>, ApiError> {
    state
        .billing
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("Stripe not configured".into()))
}

fn settings_url(state: &AppState) -> String {
    format!("{}/dashboard/settings?tab=billing", state.config.app_url)
}

/// Start a subscription checkout for the caller's organization.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Body(body): Body<CheckoutBody>,
) -> Result<Json<RedirectResponse>, ApiError> {
    auth.require(Action::ManageBilling)?;
    let price_id = required("priceId", body.price_id)?;

    let organization = state
        .store
        .get_organization(&auth.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".into()))?;

    let billing = billing_provider(&state)?;
    let request = CheckoutRequest {
        price_id,
        organization_id: organization.id.to_string(),
        customer_id: organization.stripe_customer_id.clone(),
        success_url: format!("{}&success=true", settings_url(&state)),
        cancel_url: settings_url(&state),
    };

    let session = billing
        .create_checkout_session(&request)
        .await
        .map_err(|e| ApiError::ExternalService(e.to_string()))?;

    let url = session
        .url
        .ok_or_else(|| ApiError::ExternalService("checkout session without url".into()))?;

    tracing::info!(
        org_id = %organization.id,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(Json(RedirectResponse { url }))
}

/// Open the billing portal for the caller's organization.
pub async fn create_portal(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Json<RedirectResponse>, ApiError> {
    let organization = state
        .store
        .get_organization(&auth.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".into()))?;

    let customer_id = organization
        .stripe_customer_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("No billing account".into()))?;

    let session = billing_provider(&state)?
        .create_portal_session(customer_id, &settings_url(&state))
        .await
        .map_err(|e| ApiError::ExternalService(e.to_string()))?;

    Ok(Json(RedirectResponse { url: session.url }))
}
