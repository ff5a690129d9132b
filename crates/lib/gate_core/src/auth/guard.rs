//! Access guard and role gate.
//!
//! The guard turns an `Authorization` header value into an authenticated
//! context: parse `Bearer <token>`, verify signature and kind, then compare the
//! token's version with the principal's live version. The role gate runs after
//! the admin guard and only looks at the live role.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use super::jwt::TokenCodec;
use crate::models::auth::{AdminRole, TokenKind};
use crate::store::CredentialStore;

/// Authenticated phone user attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub id: Uuid,
    pub phone: String,
    pub token_version: i64,
}

/// Authenticated admin attached to a request. `role` is read from the store,
/// not from the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContext {
    pub id: Uuid,
    pub username: String,
    pub role: AdminRole,
}

/// Extract the token from `Bearer <token>`.
///
/// The header must split on whitespace into exactly two parts and the scheme
/// must be `Bearer`.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header
        .filter(|h| !h.trim().is_empty())
        .ok_or(AuthError::MissingAuthorization)?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(AuthError::MalformedAuthorization),
    }
}

/// Validates bearer tokens against the live token version.
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Accept only access tokens whose version matches the user's.
    pub async fn authorize_user(&self, header: Option<&str>) -> Result<UserContext, AuthError> {
        let token = parse_bearer(header)?;
        let claims = self.codec.verify(token, TokenKind::Access)?;

        let user = self
            .store
            .find_user_by_id(claims.id)
            .await?
            .ok_or(AuthError::PrincipalNotFound("User"))?;

        if user.token_version != claims.token_version {
            debug!(
                id = %user.id,
                claims_version = claims.token_version,
                live_version = user.token_version,
                "stale user token rejected"
            );
            return Err(AuthError::Invalidated);
        }

        Ok(UserContext {
            id: user.id,
            phone: user.phone,
            token_version: user.token_version,
        })
    }

    /// Accept only admin tokens whose version matches the admin's.
    pub async fn authorize_admin(&self, header: Option<&str>) -> Result<AdminContext, AuthError> {
        let token = parse_bearer(header)?;
        let claims = self.codec.verify(token, TokenKind::Admin)?;

        let admin = self
            .store
            .find_admin_by_id(claims.id)
            .await?
            .ok_or(AuthError::PrincipalNotFound("Admin"))?;

        if admin.token_version != claims.token_version {
            debug!(
                id = %admin.id,
                claims_version = claims.token_version,
                live_version = admin.token_version,
                "stale admin token rejected"
            );
            return Err(AuthError::Invalidated);
        }

        Ok(AdminContext {
            id: admin.id,
            username: admin.username,
            role: admin.role,
        })
    }
}

/// Admits admins holding a required role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGate {
    required: AdminRole,
}

impl RoleGate {
    pub fn new(required: AdminRole) -> Self {
        Self { required }
    }

    pub fn required(&self) -> AdminRole {
        self.required
    }

    /// `MissingAuthorization` when no admin context was attached (the gate was
    /// mounted without the admin guard), `Forbidden` on a role mismatch.
    pub fn check(&self, admin: Option<&AdminContext>) -> Result<(), AuthError> {
        let admin = admin.ok_or(AuthError::MissingAuthorization)?;
        if admin.role == self.required {
            Ok(())
        } else {
            Err(AuthError::Forbidden(match self.required {
                AdminRole::Elevated => "Super admin access required".into(),
                AdminRole::Standard => "Regular admin access required".into(),
            }))
        }
    }
}
