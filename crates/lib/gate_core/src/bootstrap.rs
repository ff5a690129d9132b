//! First-start provisioning of the elevated admin.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::AuthError;
use crate::auth::password::{PasswordHasher, hash_blocking};
use crate::config::BootstrapAdmin;
use crate::models::auth::AdminRole;
use crate::store::{CredentialStore, NewAdmin};

/// Create the bootstrap admin unless an admin with its id already exists.
///
/// Returns `true` when the admin was created by this call.
pub async fn ensure_bootstrap_admin(
    store: &dyn CredentialStore,
    hasher: Arc<dyn PasswordHasher>,
    admin: &BootstrapAdmin,
) -> Result<bool, AuthError> {
    if let Some(existing) = store.find_admin_by_id(admin.id).await? {
        info!(id = %existing.id, username = %existing.username, "bootstrap admin already exists");
        return Ok(false);
    }

    let password_hash = hash_blocking(hasher, admin.password.clone()).await?;
    store
        .create_admin(NewAdmin {
            id: Some(admin.id),
            username: admin.username.clone(),
            password_hash,
            role: AdminRole::Elevated,
        })
        .await?;

    info!(id = %admin.id, username = %admin.username, "bootstrap admin created");
    if admin.password == "admin" {
        warn!("bootstrap admin uses the default password, change it");
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::BcryptHasher;
    use crate::store::MemoryCredentialStore;

    #[tokio::test]
    async fn creates_once() {
        let store = MemoryCredentialStore::new();
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(4));
        let admin = BootstrapAdmin::default();

        assert!(
            ensure_bootstrap_admin(&store, hasher.clone(), &admin)
                .await
                .unwrap()
        );
        assert!(
            !ensure_bootstrap_admin(&store, hasher.clone(), &admin)
                .await
                .unwrap()
        );

        let stored = store.find_admin_by_id(admin.id).await.unwrap().unwrap();
        assert_eq!(stored.username, "admin");
        assert_eq!(stored.role, AdminRole::Elevated);
        assert_eq!(stored.token_version, 0);
        assert!(hasher.verify("admin", &stored.password_hash).unwrap());
    }
}
