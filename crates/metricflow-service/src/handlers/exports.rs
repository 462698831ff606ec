//! Event export downloads.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use metricflow_core::{Action, Event, EventFilter, OrganizationId};

use crate::auth::SessionAuth;
use crate::error::ApiError;
use crate::export::{events_csv, events_pdf, file_date, CSV_EXPORT_LIMIT, PDF_EXPORT_LIMIT};
use crate::state::AppState;

async fn newest_events(
    state: &AppState,
    organization_id: &OrganizationId,
    limit: usize,
) -> Result<Vec<Event>, ApiError> {
    Ok(state
        .store
        .list_events(organization_id, &EventFilter::default(), limit, 0)
        .await?)
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// Download the newest events as CSV.
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Response, ApiError> {
    auth.require(Action::ExportEvents)?;

    let events = newest_events(&state, &auth.organization_id, CSV_EXPORT_LIMIT).await?;
    let body = events_csv(&events).map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(org_id = %auth.organization_id, rows = events.len(), "CSV export");

    Ok(attachment(
        "text/csv",
        &format!("events-{}.csv", file_date(Utc::now())),
        body,
    ))
}

/// Download the analytics report as PDF.
pub async fn export_pdf(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Response, ApiError> {
    auth.require(Action::ExportEvents)?;

    let events = newest_events(&state, &auth.organization_id, PDF_EXPORT_LIMIT).await?;
    let now = Utc::now();
    let body = events_pdf(&events, now);

    tracing::info!(org_id = %auth.organization_id, rows = events.len(), "PDF export");

    Ok(attachment(
        "application/pdf",
        &format!("report-{}.pdf", file_date(now)),
        body,
    ))
}
