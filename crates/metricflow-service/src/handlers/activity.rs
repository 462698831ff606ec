//! Activity log handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;

use metricflow_core::{ActivityLog, ACTIVITY_PAGE_SIZE};
use metricflow_store::ActivityRecord;

use crate::auth::SessionAuth;
use crate::error::ApiError;
use crate::handlers::{Page, PageQuery, Pagination};
use crate::state::AppState;

/// The user behind an activity entry.
#[derive(Debug, Serialize)]
pub struct ActivityUser {
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: String,
}

/// An activity entry as shown in the dashboard.
#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    /// The entry.
    #[serde(flatten)]
    pub entry: ActivityLog,
    /// Who acted; absent for system changes or deleted users.
    pub user: Option<ActivityUser>,
}

impl From<ActivityRecord> for ActivityEntry {
    fn from(record: ActivityRecord) -> Self {
        Self {
            entry: record.entry,
            user: record.user.map(|u| ActivityUser {
                name: u.name,
                email: u.email,
            }),
        }
    }
}

/// List the organization's activity, newest first.
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ActivityEntry>>, ApiError> {
    let paging = PageQuery {
        page: query.page,
        limit: Some(query.limit.unwrap_or(ACTIVITY_PAGE_SIZE)),
    };

    let records = state
        .store
        .list_activity(&auth.organization_id, paging.limit(), paging.offset())
        .await?;
    let total = state.store.count_activity(&auth.organization_id).await?;

    Ok(Json(Page {
        data: records.into_iter().map(ActivityEntry::from).collect(),
        pagination: Pagination::new(&paging, total),
    }))
}
