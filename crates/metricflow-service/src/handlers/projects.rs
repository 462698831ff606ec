//! Project handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use metricflow_core::{Action, ActivityKind, ActivityLog, Project, ProjectSummary};

use crate::auth::SessionAuth;
use crate::error::ApiError;
use crate::handlers::{required, Body};
use crate::state::AppState;

/// Create project request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateProjectRequest {
    /// Display name.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Dashboard color (hex).
    pub color: Option<String>,
}

/// List the organization's projects with event counts.
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    Ok(Json(state.store.list_projects(&auth.organization_id).await?))
}

/// Create a project.
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Body(body): Body<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    auth.require(Action::CreateProject)?;

    let name = required("name", body.name)?;
    let project = Project::new(auth.organization_id, &name, body.description, body.color)?;
    state.store.create_project(&project).await?;

    tracing::info!(
        org_id = %auth.organization_id,
        project_id = %project.id,
        "Project created"
    );
    state
        .record_activity(ActivityLog::new(
            auth.organization_id,
            Some(auth.user_id),
            ActivityKind::ProjectCreated,
            Some(project.id.to_string()),
            format!("Created project {}", project.name),
        ))
        .await;

    Ok((StatusCode::CREATED, Json(project)))
}
