//! User accounts and single-use auth tokens.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::OnceLock;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::UserId;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Login email, unique.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the email address was confirmed.
    pub email_verified_at: Option<DateTime<Utc>>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create an unverified user with an already-hashed password.
    #[must_use]
    pub fn new(email: &str, name: Option<String>, password_hash: String) -> Self {
        Self {
            id: UserId::generate(),
            email: email.to_string(),
            name,
            password_hash,
            email_verified_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Purpose of a single-use token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Password reset link.
    PasswordReset,
    /// Email verification link.
    EmailVerification,
}

impl TokenKind {
    /// How long a freshly issued token stays valid.
    #[must_use]
    pub fn ttl(self) -> Duration {
        match self {
            Self::PasswordReset => Duration::hours(1),
            Self::EmailVerification => Duration::hours(24),
        }
    }

    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
            Self::EmailVerification => "email_verification",
        }
    }
}

/// A single-use token mailed to `email`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// What the token is for.
    pub kind: TokenKind,
    /// Address the token was issued to.
    pub email: String,
    /// Opaque token value.
    pub token: String,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Issue a new token of `kind` for `email`.
    #[must_use]
    pub fn issue(kind: TokenKind, email: &str) -> Self {
        Self {
            kind,
            email: email.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            expires_at: Utc::now() + kind.ttl(),
        }
    }

    /// Whether the token has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Hash a password with Argon2id and a random 16-byte salt.
///
/// # Errors
///
/// Returns [`DomainError::PasswordHash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, DomainError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| DomainError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::PasswordHash(e.to_string()))
}

/// Check `password` against a stored PHC string. Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Run a full verification against a throwaway hash. Always `false`.
///
/// Sign-in calls this for unknown emails so both outcomes cost one Argon2
/// verification.
#[must_use]
pub fn verify_against_dummy(password: &str) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    if let Some(hash) = DUMMY_HASH.get_or_init(|| hash_password("metricflow-dummy").ok()) {
        let _ = verify_password(password, hash);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn dummy_verification_never_succeeds() {
        assert!(!verify_against_dummy("metricflow-dummy"));
        assert!(!verify_against_dummy(""));
    }

    #[test]
    fn reset_tokens_expire_after_an_hour() {
        let token = AuthToken::issue(TokenKind::PasswordReset, "dev@example.com");
        assert!(!token.is_expired(Utc::now()));
        assert!(token.is_expired(Utc::now() + Duration::minutes(61)));
    }

    #[test]
    fn verification_tokens_last_a_day() {
        let token = AuthToken::issue(TokenKind::EmailVerification, "dev@example.com");
        assert!(!token.is_expired(Utc::now() + Duration::hours(23)));
        assert!(token.is_expired(Utc::now() + Duration::hours(25)));
    }
}
