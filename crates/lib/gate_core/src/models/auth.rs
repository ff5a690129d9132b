//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `gate_api::models`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phone-authenticated end user of the mobile app.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    /// E.164 phone number, the login key.
    pub phone: String,
    pub password_hash: String,
    /// Bumped to invalidate every token issued before the bump.
    pub token_version: i64,
    /// Last device that logged in, if the client reported one.
    pub current_device_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Username-authenticated operator of the admin panel.
#[derive(Debug, Clone)]
pub struct Admin {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub token_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin privilege level.
///
/// Serialized as `"super"` / `"regular"`, the names the admin panel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminRole {
    #[serde(rename = "super")]
    Elevated,
    #[serde(rename = "regular")]
    Standard,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Elevated => "super",
            AdminRole::Standard => "regular",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super" => Ok(AdminRole::Elevated),
            "regular" => Ok(AdminRole::Standard),
            other => Err(format!("unknown admin role '{other}'")),
        }
    }
}

/// Token kind. One kind can never stand in for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived user token presented on user routes.
    Access,
    /// Long-lived user token exchanged for a new access token.
    Refresh,
    /// Non-expiring admin token.
    Admin,
}

impl TokenKind {
    /// Whether tokens of this kind carry an expiry.
    pub fn expires(&self) -> bool {
        !matches!(self, TokenKind::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Admin => "admin",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal id.
    pub id: Uuid,
    /// Set on user tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Set on admin tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Admin role at mint time. Informational only; guards use the live role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AdminRole>,
    pub token_type: TokenKind,
    pub token_version: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Expiry (unix timestamp). Absent on admin tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// The identity attribute: phone for users, username for admins.
    pub fn identity(&self) -> &str {
        self.phone
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or_default()
    }
}

/// Identity attribute a token is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Phone(String),
    Username {
        username: String,
        role: AdminRole,
    },
}

/// Access + refresh tokens handed out on user login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub access_expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
}

/// Result of a successful user login.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: Uuid,
    pub phone: String,
    pub token_version: i64,
    pub tokens: TokenPair,
}

/// Result of a successful admin login.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub admin_id: Uuid,
    pub username: String,
    pub role: AdminRole,
    pub token_version: i64,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_uses_panel_names() {
        assert_eq!(
            serde_json::to_string(&AdminRole::Elevated).unwrap(),
            "\"super\""
        );
        assert_eq!("regular".parse::<AdminRole>(), Ok(AdminRole::Standard));
        assert!("root".parse::<AdminRole>().is_err());
    }

    #[test]
    fn admin_claims_omit_expiry_and_phone() {
        let claims = TokenClaims {
            id: Uuid::nil(),
            phone: None,
            username: Some("admin".into()),
            role: Some(AdminRole::Elevated),
            token_type: TokenKind::Admin,
            token_version: 3,
            iat: 10,
            nbf: 10,
            exp: None,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("exp").is_none());
        assert!(json.get("phone").is_none());
        assert_eq!(json["token_type"], "admin");
        assert_eq!(claims.identity(), "admin");
    }
}
