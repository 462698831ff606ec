//! Cryptographic utilities for webhook verification.
//!
//! Stripe signs each delivery with a header of the form
//! `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`, where each `v1` value is
//! HMAC-SHA256 over `"{t}.{raw body}"` keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// No `t=` component.
    #[error("missing timestamp")]
    MissingTimestamp,

    /// No `v1=` component.
    #[error("missing v1 signature")]
    MissingSignature,

    /// Timestamp outside the tolerance window.
    #[error("timestamp outside tolerance")]
    Stale,

    /// No signature matched.
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute HMAC-SHA256 and return hex-encoded result.
///
/// Returns an empty string if the MAC cannot be keyed, which never matches a
/// real signature.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a `stripe-signature` header against the raw request body.
///
/// `now` and `tolerance_seconds` bound the age (and future skew) of the signed
/// timestamp.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first check that failed.
pub fn verify_stripe_signature(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let signed_at: i64 = timestamp.parse().map_err(|_| SignatureError::MissingTimestamp)?;
    if now.abs_diff(signed_at) > tolerance_seconds.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a `stripe-signature` header value for `payload` signed at `timestamp`.
#[must_use]
pub fn stripe_signature_header(payload: &str, secret: &str, timestamp: i64) -> String {
    let signature = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));
    format!("t={timestamp},v1={signature}")
}
