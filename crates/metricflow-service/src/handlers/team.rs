//! Team membership and invitation handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use metricflow_core::{
    validation, Action, ActivityKind, ActivityLog, Notification, OrganizationMember, Role, UserId,
};
use metricflow_store::MemberRecord;

use crate::auth::{SessionAuth, UserSession};
use crate::error::ApiError;
use crate::handlers::{required, Body};
use crate::mailer::Email;
use crate::state::AppState;

/// Invite request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InviteRequest {
    /// Invitee address.
    pub email: Option<String>,
    /// Role granted on acceptance.
    pub role: Option<String>,
}

/// Accept invite request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AcceptInviteRequest {
    /// Token from the invitation email.
    pub token: Option<String>,
}

/// The user behind a membership.
#[derive(Debug, Serialize)]
pub struct MemberUser {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: String,
}

/// A membership row as shown on the team page.
#[derive(Debug, Serialize)]
pub struct TeamMember {
    /// The membership.
    #[serde(flatten)]
    pub member: OrganizationMember,
    /// The bound user; absent for pending invites.
    pub user: Option<MemberUser>,
}

impl From<MemberRecord> for TeamMember {
    fn from(record: MemberRecord) -> Self {
        Self {
            member: record.member,
            user: record.user.map(|u| MemberUser {
                id: u.id,
                name: u.name,
                email: u.email,
            }),
        }
    }
}

/// Generic acknowledgement.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    /// Always true.
    pub success: bool,
}

/// List members and pending invites, oldest first.
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
) -> Result<Json<Vec<TeamMember>>, ApiError> {
    let members = state.store.list_members(&auth.organization_id).await?;
    Ok(Json(members.into_iter().map(TeamMember::from).collect()))
}

/// Invite someone to the organization by email.
pub async fn invite_member(
    State(state): State<Arc<AppState>>,
    auth: SessionAuth,
    Body(body): Body<InviteRequest>,
) -> Result<(StatusCode, Json<OrganizationMember>), ApiError> {
    auth.require(Action::InviteMember)?;

    let email = required("email", body.email)?;
    validation::email("email", &email)?;
    let role: Role = required("role", body.role)?.parse()?;

    let organization = state
        .store
        .get_organization(&auth.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".into()))?;

    let invite = OrganizationMember::invite(organization.id, &email, role);
    state.store.create_invite(&invite).await?;

    tracing::info!(
        org_id = %organization.id,
        member_id = %invite.id,
        role = %role,
        "Team invite created"
    );
    state
        .record_activity(ActivityLog::new(
            organization.id,
            Some(auth.user_id),
            ActivityKind::MemberInvited,
            Some(invite.id.to_string()),
            format!("Invited {email} as {role}"),
        ))
        .await;

    if let Some(token) = &invite.invite_token {
        state
            .send_email(Email::team_invite(
                &email,
                &state.config.app_url,
                &organization.name,
                token,
            ))
            .await;
    }

    Ok((StatusCode::CREATED, Json(invite)))
}

/// Accept an invitation as the signed-in user.
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    session: UserSession,
    Body(body): Body<AcceptInviteRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let token = required("token", body.token)?;
    let invalid = || ApiError::BadRequest("Invalid or already accepted invitation".into());

    let invite = state
        .store
        .find_invite(&token)
        .await?
        .filter(OrganizationMember::is_pending)
        .ok_or_else(invalid)?;

    if !state.store.accept_invite(&invite.id, &session.user_id).await? {
        return Err(invalid());
    }

    tracing::info!(
        org_id = %invite.organization_id,
        member_id = %invite.id,
        user_id = %session.user_id,
        "Team invite accepted"
    );

    let joined = invite.invited_email.as_deref().unwrap_or("A new member");
    state
        .record_activity(ActivityLog::new(
            invite.organization_id,
            Some(session.user_id),
            ActivityKind::MemberJoined,
            Some(invite.id.to_string()),
            format!("{joined} joined as {}", invite.role),
        ))
        .await;

    let members = state.store.list_members(&invite.organization_id).await?;
    for admin in members
        .iter()
        .filter(|r| r.member.role == Role::Admin && r.member.invite_accepted)
        .filter_map(|r| r.member.user_id)
        .filter(|id| *id != session.user_id)
    {
        state
            .notify(Notification::new(
                admin,
                "New team member",
                format!("{joined} joined your organization as {}", invite.role),
            ))
            .await;
    }

    Ok(Json(SuccessResponse { success: true }))
}
