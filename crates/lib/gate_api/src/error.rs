//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gate_core::auth::AuthError;
use gate_core::store::StoreError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            success: false,
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => AppError::Conflict(format!("{field} already in use")),
            StoreError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::InvalidPhoneFormat | AuthError::WeakPassword => {
                AppError::Validation(e.to_string())
            }
            AuthError::AlreadyExists(_) | AuthError::ConcurrentUpdate => {
                AppError::Conflict(e.to_string())
            }
            AuthError::InvalidCredentials
            | AuthError::Token(_)
            | AuthError::Invalidated
            | AuthError::MissingAuthorization
            | AuthError::MalformedAuthorization
            | AuthError::PrincipalNotFound(_) => AppError::Unauthorized(e.to_string()),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::Store(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use gate_core::auth::jwt::TokenError;

    use super::*;

    fn status_of(e: AuthError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(status_of(AuthError::WeakPassword), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AuthError::InvalidPhoneFormat),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AuthError::Token(TokenError::Expired)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AuthError::Invalidated), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AuthError::Forbidden("no".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AuthError::AlreadyExists("User".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AuthError::Store(StoreError::Duplicate("phone"))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AuthError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalidated_message_is_kept() {
        match AppError::from(AuthError::Invalidated) {
            AppError::Unauthorized(msg) => {
                assert_eq!(msg, "Token has been invalidated. Please login again.")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
