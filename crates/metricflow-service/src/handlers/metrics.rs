//! Metric handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use metricflow_core::{Action, Metric, ProjectId, METRIC_LIST_LIMIT};

use crate::auth::SessionAuth;
use crate::error::ApiError;
use crate::handlers::{required, Body};
use crate::state::AppState;

/// Record metric request.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordMetricRequest {
    /// Project the sample belongs to.
    pub project_id: Option<String>,
    /// Metric name.
    pub name: Option<String>,
    /// Measured value.
    pub value: Option<f64>,
}

/// The organization's newest metric samples across all projects.
pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Json<Vec<Metric>>, ApiError> {
    Ok(Json(
        state
            .store
            .list_metrics(&auth.organization_id, METRIC_LIST_LIMIT)
            .await?,
    ))
}

/// Record a metric sample against one of the organization's projects.
pub async fn record_metric(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Body(body): Body<RecordMetricRequest>,
) -> Result<(StatusCode, Json<Metric>), ApiError> {
    auth.require(Action::RecordEvent)?;

    let project_id = required("projectId", body.project_id)?
        .parse::<ProjectId>()
        .map_err(|_| ApiError::Validation {
            field: "projectId".into(),
            message: "must be a valid project id".into(),
        })?;
    let name = required("name", body.name)?;
    let value = body.value.ok_or_else(|| ApiError::Validation {
        field: "value".into(),
        message: "is required".into(),
    })?;

    state
        .store
        .get_project(&auth.organization_id, &project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;

    let metric = Metric::new(project_id, &name, value)?;
    state.store.insert_metric(&metric).await?;

    tracing::debug!(
        org_id = %auth.organization_id,
        project_id = %project_id,
        name = %metric.name,
        "Metric recorded"
    );

    Ok((StatusCode::CREATED, Json(metric)))
}
