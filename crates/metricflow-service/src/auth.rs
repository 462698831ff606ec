//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `ApiKeyAuth` - Machine ingestion via the `x-api-key` header
//! - `UserSession` - A signed-in user, not yet tied to an organization
//! - `SessionAuth` - A signed-in member of an organization, with their role

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use metricflow_core::{hash_secret, Action, ApiKey, Organization, OrganizationId, Role, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying an ingestion API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Issued at.
    pub iat: i64,
    /// Expiration time.
    pub exp: i64,
}

/// Sign an HS256 session token for `user_id`.
pub fn issue_session_token(
    user_id: &UserId,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign session token: {e}")))
}

fn validate_session_token(token: &str, secret: &str) -> Result<UserId, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Session token validation failed");
        ApiError::Unauthorized
    })?;

    data.claims
        .sub
        .parse::<UserId>()
        .map_err(|_| ApiError::Unauthorized)
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)
}

/// A request authenticated by an organization API key.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    /// The key that authenticated the request.
    pub key: ApiKey,
    /// The organization owning the key, as loaded with it.
    pub organization: Organization,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let (key, organization) = state
            .store
            .find_api_key(&hash_secret(secret))
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let now = Utc::now();
        if key.is_expired(now) {
            tracing::debug!(key_id = %key.id, "Rejected expired API key");
            return Err(ApiError::Unauthorized);
        }

        // Usage stamp; never fails the request.
        let store = Arc::clone(&state.store);
        let key_id = key.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key(&key_id, now).await {
                tracing::warn!(key_id = %key_id, error = %e, "Failed to record API key usage");
            }
        });

        Ok(Self { key, organization })
    }
}

/// A signed-in user.
#[derive(Debug, Clone, Copy)]
pub struct UserSession {
    /// The user ID.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for UserSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user_id = validate_session_token(token, &state.config.jwt_secret)?;
        Ok(Self { user_id })
    }
}

/// A signed-in member of an organization.
#[derive(Debug, Clone, Copy)]
pub struct SessionAuth {
    /// The user ID.
    pub user_id: UserId,
    /// The organization the session acts on.
    pub organization_id: OrganizationId,
    /// The member's role in that organization.
    pub role: Role,
}

impl SessionAuth {
    /// Require the member's role to permit `action`.
    pub fn require(&self, action: Action) -> Result<(), ApiError> {
        if self.role.can(action) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                role = %self.role,
                action = ?action,
                "Role does not permit action"
            );
            Err(ApiError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let UserSession { user_id } = UserSession::from_request_parts(parts, state).await?;

        let member = state
            .store
            .find_membership_for_user(&user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(Self {
            user_id,
            organization_id: member.organization_id,
            role: member.role,
        })
    }
}
