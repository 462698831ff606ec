//! Organization audit trail.
//!
//! Entries are appended by the dashboard handlers after a change succeeds and
//! are never edited.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{ActivityId, OrganizationId, UserId};

/// Page size for activity listings when none is requested.
pub const ACTIVITY_PAGE_SIZE: usize = 20;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    /// A project was created.
    ProjectCreated,
    /// An API key was issued.
    ApiKeyCreated,
    /// An API key was revoked.
    ApiKeyRevoked,
    /// Someone was invited to the organization.
    MemberInvited,
    /// An invite was accepted.
    MemberJoined,
    /// Organization settings changed.
    SettingsUpdated,
}

impl ActivityKind {
    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProjectCreated => "PROJECT_CREATED",
            Self::ApiKeyCreated => "API_KEY_CREATED",
            Self::ApiKeyRevoked => "API_KEY_REVOKED",
            Self::MemberInvited => "MEMBER_INVITED",
            Self::MemberJoined => "MEMBER_JOINED",
            Self::SettingsUpdated => "SETTINGS_UPDATED",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROJECT_CREATED" => Ok(Self::ProjectCreated),
            "API_KEY_CREATED" => Ok(Self::ApiKeyCreated),
            "API_KEY_REVOKED" => Ok(Self::ApiKeyRevoked),
            "MEMBER_INVITED" => Ok(Self::MemberInvited),
            "MEMBER_JOINED" => Ok(Self::MemberJoined),
            "SETTINGS_UPDATED" => Ok(Self::SettingsUpdated),
            _ => Err(ValidationError::new("action", format!("unknown activity {s}"))),
        }
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    /// Entry ID.
    pub id: ActivityId,
    /// Organization the change happened in.
    pub organization_id: OrganizationId,
    /// Who made the change, if a user did.
    pub user_id: Option<UserId>,
    /// What happened.
    pub action: ActivityKind,
    /// ID of the affected record.
    pub entity_id: Option<String>,
    /// Human-readable summary.
    pub description: String,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    /// A new entry for `action` performed by `user_id` now.
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        user_id: Option<UserId>,
        action: ActivityKind,
        entity_id: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: ActivityId::generate(),
            organization_id,
            user_id,
            action,
            entity_id,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_their_wire_form() {
        for kind in [
            ActivityKind::ProjectCreated,
            ActivityKind::ApiKeyCreated,
            ActivityKind::ApiKeyRevoked,
            ActivityKind::MemberInvited,
            ActivityKind::MemberJoined,
            ActivityKind::SettingsUpdated,
        ] {
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.as_str().to_string())
            );
        }
        assert!("DELETED_EVERYTHING".parse::<ActivityKind>().is_err());
    }
}
