//! API keys for machine-to-machine ingestion.
//!
//! The secret is generated once and returned to the creator; only its
//! SHA-256 digest and a short display prefix are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ApiKeyId, OrganizationId};

/// Prefix carried by every live key secret.
pub const API_KEY_PREFIX: &str = "mk_live_";

/// Number of leading secret characters kept for display.
const DISPLAY_PREFIX_LEN: usize = 12;

/// A stored API key (never includes the secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    /// Key record ID.
    pub id: ApiKeyId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Human label.
    pub name: String,
    /// First characters of the secret, for recognition in listings.
    pub key_prefix: String,
    /// SHA-256 digest of the secret.
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// When the key was created.
    pub created_at: DateTime<Utc>,
    /// Last successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Generate a key for `organization_id`, returning the record and its secret.
    #[must_use]
    pub fn generate(
        organization_id: OrganizationId,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> (Self, String) {
        let secret = format!("{API_KEY_PREFIX}{}", uuid::Uuid::new_v4().simple());
        let key = Self {
            id: ApiKeyId::generate(),
            organization_id,
            name: name.to_string(),
            key_prefix: secret.chars().take(DISPLAY_PREFIX_LEN).collect(),
            key_hash: hash_secret(&secret),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at,
        };
        (key, secret)
    }

    /// Whether the key has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Digest a presented secret for lookup.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
