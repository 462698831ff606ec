//! Projects group the events of one tracked application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;
use crate::{OrganizationId, ProjectId};

/// Display color used when none is given.
pub const DEFAULT_PROJECT_COLOR: &str = "#3B82F6";

/// A project owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project ID.
    pub id: ProjectId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Display color.
    pub color: String,
    /// When the project was created.
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a project for `organization_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for `name` when it is empty.
    pub fn new(
        organization_id: OrganizationId,
        name: &str,
        description: Option<String>,
        color: Option<String>,
    ) -> Result<Self, ValidationError> {
        validation::min_len("name", name, 1)?;
        Ok(Self {
            id: ProjectId::generate(),
            organization_id,
            name: name.to_string(),
            description,
            color: color.unwrap_or_else(|| DEFAULT_PROJECT_COLOR.to_string()),
            created_at: Utc::now(),
        })
    }
}

/// A project with its event count, as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// The project.
    #[serde(flatten)]
    pub project: Project,
    /// Number of events recorded against it.
    pub event_count: i64,
}
