//! Dashboard event handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use metricflow_core::{Action, Event, EventFilter, EventType, ProjectId};

use crate::auth::SessionAuth;
use crate::error::ApiError;
use crate::handlers::ingest::store_event;
use crate::handlers::{Body, Page, PageQuery, Pagination};
use crate::state::AppState;

/// Event list query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
    /// Only events of this type.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Only events of this project.
    pub project_id: Option<String>,
}

impl ListEventsQuery {
    fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    fn filter(&self) -> Result<EventFilter, ApiError> {
        let event_type = self
            .event_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::parse::<EventType>)
            .transpose()?;
        let project_id = self
            .project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<ProjectId>().map_err(|_| ApiError::Validation {
                    field: "projectId".into(),
                    message: "must be a valid project id".into(),
                })
            })
            .transpose()?;
        Ok(EventFilter {
            event_type,
            project_id,
        })
    }
}

/// List the organization's events, newest first, with optional filters.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Page<Event>>, ApiError> {
    let filter = query.filter()?;
    let paging = query.paging();

    let data = state
        .store
        .list_events(&auth.organization_id, &filter, paging.limit(), paging.offset())
        .await?;
    let total = state
        .store
        .count_events(&auth.organization_id, &filter)
        .await?;

    Ok(Json(Page {
        data,
        pagination: Pagination::new(&paging, total),
    }))
}

/// Record an event from the dashboard. Does not count against the API quota.
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Body(payload): Body<Value>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    auth.require(Action::RecordEvent)?;

    let event = store_event(&state, &auth.organization_id, &payload).await?;

    tracing::debug!(
        org_id = %auth.organization_id,
        event_id = %event.id,
        "Event recorded from dashboard"
    );

    Ok((StatusCode::CREATED, Json(event)))
}
