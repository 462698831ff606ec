//! Organization and settings handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use metricflow_core::{
    validation, Action, ActivityKind, ActivityLog, Organization, OrganizationId, OrganizationMember,
};

use crate::auth::{SessionAuth, UserSession};
use crate::error::ApiError;
use crate::handlers::{required, Body};
use crate::state::AppState;

/// Create organization request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateOrganizationRequest {
    /// Display name.
    pub name: Option<String>,
    /// Unique URL slug.
    pub slug: Option<String>,
}

/// Update settings request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSettingsRequest {
    /// New display name.
    pub name: Option<String>,
}

async fn load_organization(state: &AppState, id: &OrganizationId) -> Result<Organization, ApiError> {
    state
        .store
        .get_organization(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".into()))
}

/// Get the caller's organization.
pub async fn get_organization(
    State(state): State<Arc<AppState>>,
    session: UserSession,
) -> Result<Json<Organization>, ApiError> {
    let member = state
        .store
        .find_membership_for_user(&session.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No organization found".into()))?;

    Ok(Json(load_organization(&state, &member.organization_id).await?))
}

/// Create an organization with the caller as its admin.
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    session: UserSession,
    Body(body): Body<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    let name = required("name", body.name)?;
    let slug = required("slug", body.slug)?;

    let organization = Organization::new(&name, &slug)?;
    let founder = OrganizationMember::founder(organization.id, session.user_id);
    state
        .store
        .create_organization(&organization, &founder)
        .await?;

    tracing::info!(
        org_id = %organization.id,
        user_id = %session.user_id,
        slug = %organization.slug,
        "Organization created"
    );

    Ok((StatusCode::CREATED, Json(organization)))
}

/// Get organization settings.
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Json<Organization>, ApiError> {
    Ok(Json(load_organization(&state, &auth.organization_id).await?))
}

/// Update organization settings.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Body(body): Body<UpdateSettingsRequest>,
) -> Result<Json<Organization>, ApiError> {
    auth.require(Action::UpdateSettings)?;

    let Some(name) = body.name else {
        return Ok(Json(load_organization(&state, &auth.organization_id).await?));
    };
    validation::min_len("name", &name, 2)?;

    let organization = state
        .store
        .rename_organization(&auth.organization_id, &name)
        .await?;

    tracing::info!(org_id = %auth.organization_id, "Organization settings updated");
    state
        .record_activity(ActivityLog::new(
            auth.organization_id,
            Some(auth.user_id),
            ActivityKind::SettingsUpdated,
            None,
            format!("Renamed organization to {}", organization.name),
        ))
        .await;

    Ok(Json(organization))
}
