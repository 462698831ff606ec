//! API key management handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use metricflow_core::{validation, Action, ActivityKind, ActivityLog, ApiKey, ApiKeyId};

use crate::auth::SessionAuth;
use crate::error::ApiError;
use crate::handlers::{required, Body};
use crate::state::AppState;

/// Create API key request.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    /// Label shown in the dashboard.
    pub name: Option<String>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A newly created key, including its secret.
#[derive(Debug, Serialize)]
pub struct CreatedApiKey {
    /// The stored key record.
    #[serde(flatten)]
    pub api_key: ApiKey,
    /// The secret. Returned only once.
    pub key: String,
}

/// List the organization's API keys.
pub async fn list_api_keys(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Json<Vec<ApiKey>>, ApiError> {
    Ok(Json(state.store.list_api_keys(&auth.organization_id).await?))
}

/// Create an API key.
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Body(body): Body<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreatedApiKey>), ApiError> {
    auth.require(Action::ManageApiKeys)?;

    let name = required("name", body.name)?;
    validation::min_len("name", &name, 1)?;

    let (api_key, key) = ApiKey::generate(auth.organization_id, &name, body.expires_at);
    state.store.create_api_key(&api_key).await?;

    tracing::info!(
        org_id = %auth.organization_id,
        key_id = %api_key.id,
        prefix = %api_key.key_prefix,
        "API key created"
    );
    state
        .record_activity(ActivityLog::new(
            auth.organization_id,
            Some(auth.user_id),
            ActivityKind::ApiKeyCreated,
            Some(api_key.id.to_string()),
            format!("Created API key {}", api_key.name),
        ))
        .await;

    Ok((StatusCode::CREATED, Json(CreatedApiKey { api_key, key })))
}

/// Delete an API key.
pub async fn delete_api_key(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require(Action::ManageApiKeys)?;

    let not_found = || ApiError::NotFound("API key not found".into());
    let id: ApiKeyId = id.parse().map_err(|_| not_found())?;

    if !state.store.delete_api_key(&auth.organization_id, &id).await? {
        return Err(not_found());
    }

    tracing::info!(org_id = %auth.organization_id, key_id = %id, "API key deleted");
    state
        .record_activity(ActivityLog::new(
            auth.organization_id,
            Some(auth.user_id),
            ActivityKind::ApiKeyRevoked,
            Some(id.to_string()),
            "Revoked an API key",
        ))
        .await;

    Ok(StatusCode::NO_CONTENT)
}
