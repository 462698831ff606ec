//! Organization membership and role-based access.
//!
//! Access is a per-action minimum role, not a hierarchy of permissions:
//! every guarded operation names an [`Action`], and [`Role::can`] compares
//! the member's rank to that action's minimum.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{MemberId, OrganizationId, UserId};

/// A member's role within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full control, including billing, keys and team.
    Admin,
    /// Can create projects, record events and export.
    Editor,
    /// Read-only dashboard access.
    Viewer,
}

impl Role {
    const fn rank(self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::Editor => 1,
            Self::Admin => 2,
        }
    }

    /// Whether this role may perform `action`.
    #[must_use]
    pub const fn can(self, action: Action) -> bool {
        self.rank() >= action.min_role().rank()
    }

    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Editor => "EDITOR",
            Self::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "EDITOR" => Ok(Self::Editor),
            "VIEWER" => Ok(Self::Viewer),
            _ => Err(ValidationError::new(
                "role",
                "must be one of ADMIN, EDITOR, VIEWER",
            )),
        }
    }
}

/// Operations guarded by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read dashboards, projects, events, members and settings.
    View,
    /// Record events and metrics from the dashboard.
    RecordEvent,
    /// Download CSV or PDF exports.
    ExportEvents,
    /// Create projects.
    CreateProject,
    /// Create or revoke API keys.
    ManageApiKeys,
    /// Invite members.
    InviteMember,
    /// Start checkout or update organization settings.
    ManageBilling,
    /// Rename the organization.
    UpdateSettings,
}

impl Action {
    /// The lowest role allowed to perform this action.
    #[must_use]
    pub const fn min_role(self) -> Role {
        match self {
            Self::View => Role::Viewer,
            Self::RecordEvent | Self::ExportEvents | Self::CreateProject => Role::Editor,
            Self::ManageApiKeys | Self::InviteMember | Self::ManageBilling | Self::UpdateSettings => {
                Role::Admin
            }
        }
    }
}

/// A user's membership in an organization, or a pending invite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMember {
    /// Membership ID.
    pub id: MemberId,
    /// Organization joined.
    pub organization_id: OrganizationId,
    /// Bound user; `None` until an invite is accepted.
    pub user_id: Option<UserId>,
    /// Role granted.
    pub role: Role,
    /// Address the invite was sent to.
    pub invited_email: Option<String>,
    /// Outstanding invite token, cleared on acceptance.
    #[serde(skip_serializing)]
    pub invite_token: Option<String>,
    /// Whether the invite has been accepted.
    pub invite_accepted: bool,
    /// When the membership (or invite) was created.
    pub created_at: DateTime<Utc>,
}

impl OrganizationMember {
    /// An accepted membership for the organization's creator.
    #[must_use]
    pub fn founder(organization_id: OrganizationId, user_id: UserId) -> Self {
        Self {
            id: MemberId::generate(),
            organization_id,
            user_id: Some(user_id),
            role: Role::Admin,
            invited_email: None,
            invite_token: None,
            invite_accepted: true,
            created_at: Utc::now(),
        }
    }

    /// A pending invite, not yet bound to any user.
    #[must_use]
    pub fn invite(organization_id: OrganizationId, email: &str, role: Role) -> Self {
        Self {
            id: MemberId::generate(),
            organization_id,
            user_id: None,
            role,
            invited_email: Some(email.to_string()),
            invite_token: Some(uuid::Uuid::new_v4().to_string()),
            invite_accepted: false,
            created_at: Utc::now(),
        }
    }

    /// Whether this is an invite awaiting acceptance.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.invite_accepted
    }

    /// Bind the invite to `user_id` and retire its token.
    pub fn accept(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
        self.invite_accepted = true;
        self.invite_token = None;
    }
}
