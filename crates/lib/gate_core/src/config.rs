//! Authentication settings.
//!
//! Built once at start-up and handed to the token codec and session issuer.
//! Nothing in the request path reads the environment.

use chrono::Duration;
use uuid::Uuid;

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Default refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Longest accepted token lifetime: 10 years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Well-known id of the admin provisioned on first start-up.
pub const DEFAULT_BOOTSTRAP_ADMIN_ID: Uuid = Uuid::from_u128(1);

/// Token and hashing settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC signing secret.
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    /// Settings with the default lifetimes and hashing cost.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Credentials of the admin created on first start-up.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub id: Uuid,
    pub username: String,
    pub password: String,
}

impl Default for BootstrapAdmin {
    fn default() -> Self {
        Self {
            id: DEFAULT_BOOTSTRAP_ADMIN_ID,
            username: "admin".into(),
            password: "admin".into(),
        }
    }
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("id", &self.id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_id_is_well_known() {
        assert_eq!(
            DEFAULT_BOOTSTRAP_ADMIN_ID.to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn debug_hides_secret() {
        let cfg = AuthConfig::new("hunter2");
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
