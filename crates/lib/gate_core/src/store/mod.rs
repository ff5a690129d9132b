//! Credential store: persistence of users and admins.
//!
//! The auth core only talks to [`CredentialStore`]. Lookups never return
//! soft-deleted rows. Writes that touch `token_version` are single atomic
//! statements (conditional update or in-place increment) so concurrent logins
//! cannot lose a bump.
//!
//! Soft-deleting a principal frees its phone / username: uniqueness only holds
//! among rows that are not deleted.
//!
//! Both stores also implement [`AuditLog`], the record of admin actions.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::audit::{AuditEntry, AuditStatus};
use crate::models::auth::{Admin, AdminRole, User};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A live row already holds the unique key.
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Fields of a user being registered.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone: String,
    pub password_hash: String,
}

/// Fields of an admin being created. `id` is generated when `None`.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub id: Option<Uuid>,
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
}

/// Administrative changes to a user. `bump_version` increments the token
/// version in the same statement.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub bump_version: bool,
}

/// Administrative changes to an admin. Never touches the token version.
#[derive(Debug, Clone, Default)]
pub struct AdminUpdate {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<AdminRole>,
}

/// An audit record about to be written.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub admin_id: Uuid,
    pub admin_name: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
}

/// Exact-match filters on the audit log. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub admin_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.admin_id.is_none_or(|id| entry.admin_id == id)
            && self.action.as_deref().is_none_or(|a| entry.action == a)
            && self
                .resource_type
                .as_deref()
                .is_none_or(|r| entry.resource_type == r)
    }
}

/// Paging and filtering for list endpoints.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    /// `None` returns every row.
    pub limit: Option<u32>,
    /// Substring match on phone / username.
    pub search: Option<String>,
    pub newest_first: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
            search: None,
            newest_first: true,
        }
    }
}

impl ListQuery {
    pub fn offset(&self) -> u64 {
        match self.limit {
            Some(limit) => u64::from(self.page.saturating_sub(1)) * u64::from(limit),
            None => 0,
        }
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Persistence consumed by the session issuer, access guard and account
/// management.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn phone_exists(&self, phone: &str) -> Result<bool, StoreError>;

    /// Insert a user at version 0. Fails with [`StoreError::Duplicate`] when a
    /// live user holds the phone.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Compare-and-swap of the login state: sets `token_version` to
    /// `new_version` (and `current_device_id` when given) only if the live row
    /// is still at `expected_version`. Returns `false` when it was not.
    async fn update_user_session(
        &self,
        id: Uuid,
        expected_version: i64,
        new_version: i64,
        device_id: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Apply an administrative update; `None` when no live user has `id`.
    async fn update_user(&self, id: Uuid, update: UserUpdate)
    -> Result<Option<User>, StoreError>;

    /// Soft-delete and bump the version in one statement. `false` when no
    /// live user has `id`.
    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_users(&self, query: &ListQuery) -> Result<Page<User>, StoreError>;

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StoreError>;

    async fn find_admin_by_id(&self, id: Uuid) -> Result<Option<Admin>, StoreError>;

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;

    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin, StoreError>;

    /// Atomically increment the admin's version, returning the new value.
    async fn bump_admin_version(&self, id: Uuid) -> Result<Option<i64>, StoreError>;

    async fn update_admin(
        &self,
        id: Uuid,
        update: AdminUpdate,
    ) -> Result<Option<Admin>, StoreError>;

    /// Soft-delete and bump the version in one statement.
    async fn soft_delete_admin(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_admins(
        &self,
        query: &ListQuery,
        role: Option<AdminRole>,
    ) -> Result<Page<Admin>, StoreError>;
}

/// Append-only record of administrative actions.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError>;

    /// Entries matching `filter`, paged by `query` (`search` is ignored).
    async fn list_audit(
        &self,
        query: &ListQuery,
        filter: &AuditFilter,
    ) -> Result<Page<AuditEntry>, StoreError>;

    async fn find_audit(&self, id: Uuid) -> Result<Option<AuditEntry>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_without_limit() {
        let q = ListQuery {
            page: 5,
            ..ListQuery::default()
        };
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn offset_counts_previous_pages() {
        let q = ListQuery {
            page: 3,
            limit: Some(20),
            ..ListQuery::default()
        };
        assert_eq!(q.offset(), 40);
    }
}
