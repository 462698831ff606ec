//! Shared field validators.
//!
//! Each validator takes the wire name of the field so the caller can surface
//! exactly which field failed.

use crate::error::ValidationError;

/// Minimum password length for account passwords.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Require at least `min` characters.
///
/// # Errors
///
/// Returns a [`ValidationError`] for `field` when `value` is shorter than `min`.
pub fn min_len(field: &str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.chars().count() < min {
        let unit = if min == 1 { "character" } else { "characters" };
        return Err(ValidationError::new(
            field,
            format!("must contain at least {min} {unit}"),
        ));
    }
    Ok(())
}

/// Require a lowercase slug of `[a-z0-9-]`, at least two characters long.
///
/// # Errors
///
/// Returns a [`ValidationError`] for `field` when `value` is not a valid slug.
pub fn slug(field: &str, value: &str) -> Result<(), ValidationError> {
    min_len(field, value, 2)?;
    let valid = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(ValidationError::new(
            field,
            "may only contain lowercase letters, digits and hyphens",
        ));
    }
    Ok(())
}

/// Require something shaped like an email address.
///
/// # Errors
///
/// Returns a [`ValidationError`] for `field` when `value` is not an email address.
pub fn email(field: &str, value: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new(field, "must be a valid email address");

    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || value.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}

/// Require an acceptable account password.
///
/// # Errors
///
/// Returns a [`ValidationError`] for `field` when `value` is too short.
pub fn password(field: &str, value: &str) -> Result<(), ValidationError> {
    min_len(field, value, MIN_PASSWORD_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_len_counts_characters() {
        assert!(min_len("name", "é", 1).is_ok());
        let err = min_len("name", "", 1).unwrap_err();
        assert_eq!(err.field, "name");
        assert_eq!(err.message, "must contain at least 1 character");
    }

    #[test]
    fn slug_accepts_kebab_case() {
        assert!(slug("slug", "acme-2").is_ok());
        assert!(slug("slug", "a").is_err());
        assert!(slug("slug", "Acme").is_err());
        assert!(slug("slug", "acme_inc").is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(email("email", "dev@example.com").is_ok());
        assert!(email("email", "dev@localhost").is_err());
        assert!(email("email", "@example.com").is_err());
        assert!(email("email", "dev@@example.com").is_err());
        assert!(email("email", "dev example@example.com").is_err());
        assert!(email("email", "dev.example.com").is_err());
    }

    #[test]
    fn password_requires_eight_characters() {
        assert!(password("password", "hunter22").is_ok());
        assert!(password("password", "short").is_err());
    }
}
