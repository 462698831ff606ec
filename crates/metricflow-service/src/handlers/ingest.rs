//! Machine ingestion API (`/api/v1`), authenticated by organization API key.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::Value;

use metricflow_core::{Event, EventFilter, EventId, NewEvent, OrganizationId, ProjectSummary};

use crate::auth::ApiKeyAuth;
use crate::error::ApiError;
use crate::handlers::PageQuery;
use crate::state::AppState;

/// Record one event.
///
/// Quota is checked against the organization as loaded with the key; the
/// check and the increment are not serialized, so concurrent calls may
/// overshoot the limit by the number in flight.
pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    auth: ApiKeyAuth,
    body: Bytes,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let organization = &auth.organization;

    if !organization.has_quota_remaining() {
        tracing::info!(
            org_id = %organization.id,
            count = organization.api_request_count,
            limit = organization.api_rate_limit,
            "Ingestion quota exhausted"
        );
        return Err(ApiError::RateLimitExceeded);
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|e| ApiError::Validation {
        field: "body".into(),
        message: format!("invalid JSON: {e}"),
    })?;

    let event = store_event(&state, &organization.id, &payload).await?;

    let count = state
        .store
        .increment_api_request_count(&organization.id)
        .await?;

    tracing::debug!(
        org_id = %organization.id,
        event_id = %event.id,
        key_id = %auth.key.id,
        count,
        "Event ingested"
    );

    Ok((StatusCode::CREATED, Json(event)))
}

/// Validate a payload, check project ownership and persist the event.
pub(crate) async fn store_event(
    state: &AppState,
    organization_id: &OrganizationId,
    payload: &Value,
) -> Result<Event, ApiError> {
    let new_event = NewEvent::from_json(payload)?;

    state
        .store
        .get_project(organization_id, &new_event.project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;

    let event = new_event.into_event(EventId::generate(), Utc::now());
    state.store.insert_event(&event).await?;
    Ok(event)
}

/// List the organization's events, newest first.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    auth: ApiKeyAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = state
        .store
        .list_events(
            &auth.organization.id,
            &EventFilter::default(),
            query.limit(),
            query.offset(),
        )
        .await?;

    Ok(Json(events))
}

/// Fetch one event by id.
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    auth: ApiKeyAuth,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    let not_found = || ApiError::NotFound("Event not found".into());
    let id: EventId = id.parse().map_err(|_| not_found())?;

    state
        .store
        .get_event(&auth.organization.id, &id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// List the organization's projects with event counts.
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    auth: ApiKeyAuth,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    Ok(Json(state.store.list_projects(&auth.organization.id).await?))
}
