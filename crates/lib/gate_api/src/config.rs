//! API server configuration.

use chrono::Duration;
use gate_core::auth::jwt::persisted_jwt_secret;
use gate_core::config::{
    AuthConfig, BootstrapAdmin, DEFAULT_ACCESS_TTL_SECS, DEFAULT_BCRYPT_COST,
    DEFAULT_REFRESH_TTL_SECS, MAX_TTL_SECS,
};
use thiserror::Error;
use uuid::Uuid;

/// A variable was set to something unusable.
#[derive(Debug, Error)]
#[error("invalid value for {var}: {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Token secret, lifetimes and hashing cost.
    pub auth: AuthConfig,
    /// Admin provisioned on first start.
    pub bootstrap_admin: BootstrapAdmin,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                     | Default                                   |
    /// |------------------------------|-------------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:8080`                          |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/gate`          |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file             |
    /// | `JWT_ACCESS_EXPIRY_SECS`     | `900` (1 ..= 10 years)                    |
    /// | `JWT_REFRESH_EXPIRY_SECS`    | `2592000` (1 ..= 10 years)                |
    /// | `BCRYPT_COST`                | `10`                                      |
    /// | `INIT_ADMIN_UUID`            | `00000000-0000-0000-0000-000000000001`    |
    /// | `INIT_ADMIN`                 | `admin`                                   |
    /// | `INIT_ADMIN_PASSWORD`        | `admin`                                   |
    /// | `CORS_ALLOWED_ORIGINS`       | `*` (comma separated)                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ApiConfig::from_env`] with a custom variable source.
    ///
    /// Only `lookup` is consulted. When it yields no secret, the secret
    /// persisted under the data dir is used (and created on first run).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::from_parts(lookup, persisted_jwt_secret)
    }

    fn from_parts(
        lookup: impl Fn(&str) -> Option<String>,
        fallback_secret: impl FnOnce() -> String,
    ) -> Result<Self, ConfigError> {
        let jwt_secret = ["JWT_SECRET", "AUTH_SECRET"]
            .into_iter()
            .filter_map(|var| lookup(var))
            .find(|s| !s.is_empty())
            .unwrap_or_else(fallback_secret);

        let access_ttl = parse_ttl(&lookup, "JWT_ACCESS_EXPIRY_SECS", DEFAULT_ACCESS_TTL_SECS)?;
        let refresh_ttl = parse_ttl(&lookup, "JWT_REFRESH_EXPIRY_SECS", DEFAULT_REFRESH_TTL_SECS)?;
        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;

        let defaults = BootstrapAdmin::default();
        let bootstrap_admin = BootstrapAdmin {
            id: parse_or(&lookup, "INIT_ADMIN_UUID", defaults.id)?,
            username: lookup("INIT_ADMIN").unwrap_or(defaults.username),
            password: lookup("INIT_ADMIN_PASSWORD").unwrap_or(defaults.password),
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty() && *o != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".into()),
            pg_connection_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/gate".into()),
            auth: AuthConfig::new(jwt_secret)
                .with_ttls(access_ttl, refresh_ttl)
                .with_bcrypt_cost(bcrypt_cost),
            bootstrap_admin,
            cors_allowed_origins,
        })
    }
}

fn invalid(var: &'static str, value: impl ToString) -> ConfigError {
    ConfigError {
        var,
        value: value.to_string(),
    }
}

/// Token lifetime in seconds, bounded to `1..=MAX_TTL_SECS`.
fn parse_ttl(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: i64,
) -> Result<Duration, ConfigError> {
    let secs = parse_or(lookup, var, default)?;
    if !(1..=MAX_TTL_SECS).contains(&secs) {
        return Err(invalid(var, secs));
    }
    Ok(Duration::seconds(secs))
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(var, raw)),
        None => Ok(default),
    }
}
