//! Authentication and authorization logic.
//!
//! Provides password hashing, the token codec, the session issuer, and the
//! access guard / role gate that `gate_api` mounts as middleware.

pub mod guard;
pub mod jwt;
pub mod password;
pub mod session;

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::store::StoreError;
use jwt::TokenError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// E.164: a plus sign, a non-zero digit, then up to 14 more ASCII digits.
/// `\d` is Unicode-aware in `regex`, so the class is spelled out.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{1,14}$").expect("valid phone regex"));

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid phone number format. Use international format (e.g., +77771234567)")]
    InvalidPhoneFormat,

    #[error("Password must be at least 6 characters long")]
    WeakPassword,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    Token(#[from] TokenError),

    #[error("Token has been invalidated. Please login again.")]
    Invalidated,

    #[error("Missing authorization header")]
    MissingAuthorization,

    #[error("Invalid authorization header format. Use: Bearer <token>")]
    MalformedAuthorization,

    #[error("{0} not found")]
    PrincipalNotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("Session was modified concurrently, please retry")]
    ConcurrentUpdate,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reject anything that is not an E.164 phone number.
pub fn validate_phone(phone: &str) -> Result<(), AuthError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(AuthError::InvalidPhoneFormat)
    }
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`] characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_must_be_e164() {
        assert!(validate_phone("+77771234567").is_ok());
        assert!(validate_phone("+12").is_ok());
        for bad in ["77771234567", "+0777123", "+1", "+7777123456789012", "+7 777", ""] {
            assert!(
                matches!(validate_phone(bad), Err(AuthError::InvalidPhoneFormat)),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn phone_rejects_non_ascii_digits() {
        for bad in ["+7٧٧١٢٣٤٥٦٧", "+1７７１٢٣٤", "+7۷۷۷1234567", "+٧7771234567"] {
            assert!(
                matches!(validate_phone(bad), Err(AuthError::InvalidPhoneFormat)),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn password_minimum_length() {
        assert!(matches!(
            validate_password("12345"),
            Err(AuthError::WeakPassword)
        ));
        assert!(validate_password("123456").is_ok());
        // Counted in characters, not bytes.
        assert!(matches!(
            validate_password("пар"),
            Err(AuthError::WeakPassword)
        ));
        assert!(validate_password("пароль").is_ok());
    }
}
