//! Session issuer: register, login, refresh and admin login.
//!
//! Every login decides whether to bump the principal's token version. A bump
//! invalidates every token minted before it, on every device.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::TokenCodec;
use super::password::{PasswordHasher, hash_blocking, verify_blocking};
use super::{AuthError, validate_password, validate_phone};
use crate::models::auth::{AdminSession, TokenKind, User, UserSession};
use crate::store::{CredentialStore, NewUser, StoreError};

/// How many times a user login re-reads the row after losing the version
/// compare-and-swap to a concurrent login.
const MAX_SESSION_CAS_ATTEMPTS: usize = 3;

/// Version a user login should persist.
///
/// - no device id: always bump (clients without device tracking);
/// - a device id different from the stored one: bump;
/// - same device, or nothing stored yet: keep.
pub fn next_session_version(user: &User, device_id: Option<&str>) -> i64 {
    let changed = match device_id {
        None => true,
        Some(device) => user
            .current_device_id
            .as_deref()
            .is_some_and(|current| current != device),
    };
    if changed {
        user.token_version + 1
    } else {
        user.token_version
    }
}

/// Turns verified credentials into tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: TokenCodec,
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            store,
            hasher,
            codec,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Register a phone user at version 0, returning the new id.
    pub async fn register_user(&self, phone: &str, password: &str) -> Result<Uuid, AuthError> {
        validate_phone(phone)?;
        validate_password(password)?;

        if self.store.phone_exists(phone).await? {
            return Err(AuthError::AlreadyExists(
                "User with this phone number".into(),
            ));
        }

        let password_hash = hash_blocking(self.hasher.clone(), password.to_string()).await?;
        let user = self
            .store
            .create_user(NewUser {
                phone: phone.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => {
                    AuthError::AlreadyExists("User with this phone number".into())
                }
                other => AuthError::from(other),
            })?;

        info!(id = %user.id, phone, "user registered");
        Ok(user.id)
    }

    /// Authenticate a phone user and mint an access + refresh pair.
    ///
    /// An empty `device_id` is treated as absent.
    pub async fn login_user(
        &self,
        phone: &str,
        password: &str,
        device_id: Option<&str>,
    ) -> Result<UserSession, AuthError> {
        validate_phone(phone)?;
        let device_id = device_id.filter(|d| !d.is_empty());

        let mut user = self
            .store
            .find_user_by_phone(phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid = verify_blocking(
            self.hasher.clone(),
            password.to_string(),
            user.password_hash.clone(),
        )
        .await?;
        if !valid {
            debug!(id = %user.id, "user login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        for _ in 0..MAX_SESSION_CAS_ATTEMPTS {
            let version = next_session_version(&user, device_id);
            let swapped = self
                .store
                .update_user_session(user.id, user.token_version, version, device_id)
                .await?;

            if swapped {
                if version != user.token_version {
                    info!(
                        id = %user.id,
                        previous_device = ?user.current_device_id,
                        device = ?device_id,
                        token_version = version,
                        "user sessions invalidated by login"
                    );
                }
                let tokens = self.codec.mint_user_pair(user.id, &user.phone, version)?;
                info!(id = %user.id, token_version = version, device = ?device_id, "user logged in");
                return Ok(UserSession {
                    user_id: user.id,
                    phone: user.phone,
                    token_version: version,
                    tokens,
                });
            }

            warn!(id = %user.id, "concurrent login changed token version, re-reading");
            user = self
                .store
                .find_user_by_id(user.id)
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
        }

        Err(AuthError::ConcurrentUpdate)
    }

    /// Exchange a refresh token for a new access token at the same version.
    pub async fn refresh_user_access(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.codec.verify(refresh_token, TokenKind::Refresh)?;

        let user = self
            .store
            .find_user_by_id(claims.id)
            .await?
            .ok_or(AuthError::PrincipalNotFound("User"))?;

        if user.token_version != claims.token_version {
            info!(
                id = %user.id,
                claims_version = claims.token_version,
                live_version = user.token_version,
                "refresh token invalidated"
            );
            return Err(AuthError::Invalidated);
        }

        let access = self
            .codec
            .mint_user_access(user.id, &user.phone, claims.token_version)?;
        debug!(id = %user.id, token_version = claims.token_version, "access token refreshed");
        Ok(access)
    }

    /// Authenticate an admin. Every successful login bumps the version, so
    /// only the newest admin token stays valid.
    pub async fn login_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AdminSession, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::ValidationError(
                "Username and password are required".into(),
            ));
        }

        let admin = self
            .store
            .find_admin_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid = verify_blocking(
            self.hasher.clone(),
            password.to_string(),
            admin.password_hash.clone(),
        )
        .await?;
        if !valid {
            debug!(id = %admin.id, "admin login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let version = self
            .store
            .bump_admin_version(admin.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let token = self
            .codec
            .mint_admin(admin.id, &admin.username, admin.role, version)?;
        info!(id = %admin.id, username, role = %admin.role, token_version = version, "admin logged in");

        Ok(AdminSession {
            admin_id: admin.id,
            username: admin.username,
            role: admin.role,
            token_version: version,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::auth::password::BcryptHasher;
    use crate::config::AuthConfig;
    use crate::models::auth::AdminRole;
    use crate::store::{MemoryCredentialStore, NewAdmin, UserUpdate};

    const PHONE: &str = "+77771234567";

    fn issuer() -> (SessionIssuer, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let issuer = SessionIssuer::new(
            store.clone(),
            Arc::new(BcryptHasher::new(4)),
            TokenCodec::new(&AuthConfig::new("session-test-secret")),
        );
        (issuer, store)
    }

    async fn version_of(store: &MemoryCredentialStore, id: Uuid) -> i64 {
        store
            .find_user_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .token_version
    }

    fn user_with(version: i64, device: Option<&str>) -> User {
        User {
            id: Uuid::nil(),
            phone: PHONE.into(),
            password_hash: String::new(),
            token_version: version,
            current_device_id: device.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn device_policy() {
        assert_eq!(next_session_version(&user_with(0, None), None), 1);
        assert_eq!(next_session_version(&user_with(4, Some("a")), None), 5);
        assert_eq!(next_session_version(&user_with(4, None), Some("a")), 4);
        assert_eq!(next_session_version(&user_with(4, Some("a")), Some("a")), 4);
        assert_eq!(next_session_version(&user_with(4, Some("a")), Some("b")), 5);
    }

    #[tokio::test]
    async fn register_then_login_matches_stored_version() {
        let (issuer, store) = issuer();
        let id = issuer.register_user(PHONE, "secret1").await.unwrap();
        assert_eq!(version_of(&store, id).await, 0);

        let session = issuer.login_user(PHONE, "secret1", None).await.unwrap();
        let claims = issuer
            .codec()
            .verify(&session.tokens.access_token, TokenKind::Access)
            .unwrap();
        assert_eq!(claims.id, id);
        assert_eq!(claims.token_version, version_of(&store, id).await);
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let (issuer, _) = issuer();
        assert!(matches!(
            issuer.register_user("8777", "secret1").await,
            Err(AuthError::InvalidPhoneFormat)
        ));
        assert!(matches!(
            issuer.register_user(PHONE, "short").await,
            Err(AuthError::WeakPassword)
        ));
        issuer.register_user(PHONE, "secret1").await.unwrap();
        assert!(matches!(
            issuer.register_user(PHONE, "secret2").await,
            Err(AuthError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn unknown_phone_and_wrong_password_look_the_same() {
        let (issuer, _) = issuer();
        issuer.register_user(PHONE, "secret1").await.unwrap();
        assert!(matches!(
            issuer.login_user("+19998887777", "secret1", None).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            issuer.login_user(PHONE, "wrong-pass", None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn logins_without_device_always_bump() {
        let (issuer, _) = issuer();
        issuer.register_user(PHONE, "secret1").await.unwrap();
        for expected in 1..=3 {
            let session = issuer.login_user(PHONE, "secret1", None).await.unwrap();
            assert_eq!(session.token_version, expected);
        }
        // An empty device id is the same as none.
        let session = issuer.login_user(PHONE, "secret1", Some("")).await.unwrap();
        assert_eq!(session.token_version, 4);
    }

    #[tokio::test]
    async fn same_device_keeps_version_new_device_bumps() {
        let (issuer, store) = issuer();
        let id = issuer.register_user(PHONE, "secret1").await.unwrap();
        issuer.login_user(PHONE, "secret1", None).await.unwrap();

        let a1 = issuer.login_user(PHONE, "secret1", Some("A")).await.unwrap();
        assert_eq!(a1.token_version, 1);
        let stored = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.current_device_id.as_deref(), Some("A"));

        let a2 = issuer.login_user(PHONE, "secret1", Some("A")).await.unwrap();
        assert_eq!(a2.token_version, 1);

        let b = issuer.login_user(PHONE, "secret1", Some("B")).await.unwrap();
        assert_eq!(b.token_version, 2);
        let stored = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.current_device_id.as_deref(), Some("B"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_logins_never_lose_a_bump() {
        let (issuer, store) = issuer();
        let id = issuer.register_user(PHONE, "secret1").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let issuer = issuer.clone();
                tokio::spawn(async move { issuer.login_user(PHONE, "secret1", None).await })
            })
            .collect();

        let mut versions = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(session) => versions.push(session.token_version),
                Err(AuthError::ConcurrentUpdate) => {}
                Err(other) => panic!("unexpected {other:?}"),
            }
        }

        let succeeded = versions.len();
        assert!(succeeded > 0);
        versions.sort_unstable();
        versions.dedup();
        // Every successful login got its own version and the store holds the last one.
        assert_eq!(versions.len(), succeeded);
        assert_eq!(version_of(&store, id).await, succeeded as i64);
        assert_eq!(versions.last().copied(), Some(succeeded as i64));
    }

    #[tokio::test]
    async fn refresh_keeps_version_until_it_changes() {
        let (issuer, store) = issuer();
        let id = issuer.register_user(PHONE, "secret1").await.unwrap();
        let session = issuer.login_user(PHONE, "secret1", None).await.unwrap();

        let access = issuer
            .refresh_user_access(&session.tokens.refresh_token)
            .await
            .unwrap();
        let claims = issuer.codec().verify(&access, TokenKind::Access).unwrap();
        assert_eq!(claims.token_version, 1);

        store
            .update_user(
                id,
                UserUpdate {
                    bump_version: true,
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            issuer
                .refresh_user_access(&session.tokens.refresh_token)
                .await,
            Err(AuthError::Invalidated)
        ));
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let (issuer, _) = issuer();
        issuer.register_user(PHONE, "secret1").await.unwrap();
        let session = issuer.login_user(PHONE, "secret1", None).await.unwrap();
        assert!(matches!(
            issuer
                .refresh_user_access(&session.tokens.access_token)
                .await,
            Err(AuthError::Token(_))
        ));
    }

    #[tokio::test]
    async fn admin_login_always_bumps() {
        let (issuer, store) = issuer();
        let hash = BcryptHasher::new(4).hash("admin-pass").unwrap();
        let admin = store
            .create_admin(NewAdmin {
                id: None,
                username: "ops".into(),
                password_hash: hash,
                role: AdminRole::Standard,
            })
            .await
            .unwrap();

        let first = issuer.login_admin("ops", "admin-pass").await.unwrap();
        let second = issuer.login_admin("ops", "admin-pass").await.unwrap();
        assert_eq!(first.admin_id, admin.id);
        assert_eq!(first.token_version, 1);
        assert_eq!(second.token_version, 2);
        assert_eq!(second.role, AdminRole::Standard);

        let claims = issuer
            .codec()
            .verify(&second.token, TokenKind::Admin)
            .unwrap();
        assert_eq!(claims.token_version, 2);
        assert_eq!(claims.exp, None);

        assert!(matches!(
            issuer.login_admin("ops", "nope-nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            issuer.login_admin("ghost", "admin-pass").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
