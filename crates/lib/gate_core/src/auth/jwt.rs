//! JWT token generation and verification.
//!
//! Every token carries the principal id, its identity attribute, a kind, and
//! the principal's token version at mint time. User tokens expire; admin
//! tokens never do and are only invalidated through the version.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::auth::{AdminRole, Identity, TokenClaims, TokenKind, TokenPair};

/// Clock skew tolerated on `nbf`.
const NBF_LEEWAY_SECS: i64 = 60;

/// Token codec failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    MalformedToken,

    #[error("bad signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: TokenKind,
        actual: TokenKind,
    },

    #[error("jwt encode: {0}")]
    Encode(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            _ => TokenError::MalformedToken,
        }
    }
}

/// Mints and verifies HMAC-signed tokens with a single process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();

        // Signature and algorithm only; time and kind checks are done against
        // the caller's clock in `verify_at`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a token for `principal_id`. `ttl` is required for user kinds and
    /// ignored for admin tokens.
    pub fn mint(
        &self,
        principal_id: Uuid,
        identity: &Identity,
        kind: TokenKind,
        version: i64,
        ttl: Option<Duration>,
    ) -> Result<String, TokenError> {
        self.mint_at(principal_id, identity, kind, version, ttl, Utc::now())
    }

    pub fn mint_at(
        &self,
        principal_id: Uuid,
        identity: &Identity,
        kind: TokenKind,
        version: i64,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let (phone, username, role) = match (identity, kind) {
            (Identity::Phone(phone), TokenKind::Access | TokenKind::Refresh) => {
                (Some(phone.clone()), None, None)
            }
            (Identity::Username { username, role }, TokenKind::Admin) => {
                (None, Some(username.clone()), Some(*role))
            }
            _ => {
                return Err(TokenError::Encode(format!(
                    "{kind} token cannot carry identity {identity:?}"
                )));
            }
        };

        let exp = if kind.expires() {
            let ttl = ttl.ok_or_else(|| TokenError::Encode(format!("{kind} token needs a ttl")))?;
            let exp = now
                .checked_add_signed(ttl)
                .ok_or_else(|| TokenError::Encode(format!("{kind} ttl {ttl} overflows")))?;
            Some(exp.timestamp())
        } else {
            None
        };

        let claims = TokenClaims {
            id: principal_id,
            phone,
            username,
            role,
            token_type: kind,
            token_version: version,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))?;

        debug!(
            id = %principal_id,
            kind = %kind,
            token_version = version,
            exp = ?exp,
            "token minted"
        );
        Ok(token)
    }

    /// Verify `token` as `expected` kind, returning the claims on success.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, expected, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token decode failed");
                TokenError::from(e)
            })?
            .claims;

        if claims.token_type != expected {
            debug!(expected = %expected, actual = %claims.token_type, "token kind mismatch");
            return Err(TokenError::KindMismatch {
                expected,
                actual: claims.token_type,
            });
        }

        let now = now.timestamp();
        if claims.nbf > now + NBF_LEEWAY_SECS {
            return Err(TokenError::NotYetValid);
        }
        if expected.expires() {
            match claims.exp {
                Some(exp) if now < exp => {}
                Some(_) => return Err(TokenError::Expired),
                None => return Err(TokenError::MalformedToken),
            }
        }

        Ok(claims)
    }

    /// Access + refresh tokens for a user, both stamped with `version`.
    pub fn mint_user_pair(
        &self,
        user_id: Uuid,
        phone: &str,
        version: i64,
    ) -> Result<TokenPair, TokenError> {
        let identity = Identity::Phone(phone.to_string());
        let access_token = self.mint(
            user_id,
            &identity,
            TokenKind::Access,
            version,
            Some(self.access_ttl),
        )?;
        let refresh_token = self.mint(
            user_id,
            &identity,
            TokenKind::Refresh,
            version,
            Some(self.refresh_ttl),
        )?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_in: self.access_ttl.num_seconds(),
            refresh_expires_in: self.refresh_ttl.num_seconds(),
        })
    }

    pub fn mint_user_access(
        &self,
        user_id: Uuid,
        phone: &str,
        version: i64,
    ) -> Result<String, TokenError> {
        self.mint(
            user_id,
            &Identity::Phone(phone.to_string()),
            TokenKind::Access,
            version,
            Some(self.access_ttl),
        )
    }

    /// Non-expiring admin token.
    pub fn mint_admin(
        &self,
        admin_id: Uuid,
        username: &str,
        role: AdminRole,
        version: i64,
    ) -> Result<String, TokenError> {
        let identity = Identity::Username {
            username: username.to_string(),
            role,
        };
        self.mint(admin_id, &identity, TokenKind::Admin, version, None)
    }
}

/// Load the secret persisted under the data dir, generating and saving a new
/// one on first use. Used when no secret is configured.
pub fn persisted_jwt_secret() -> String {
    secret_at(&jwt_secret_path())
}

/// Read the secret at `secret_path`, or generate one and try to write it there.
/// A failed write is logged and the generated secret is still returned.
fn secret_at(secret_path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    let persisted = secret_path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(secret_path, &secret));
    match persisted {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(
            path = %secret_path.display(),
            error = %e,
            "could not persist generated JWT secret; tokens will not survive a restart"
        ),
    }
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gate")
        .join("jwt-secret")
}
