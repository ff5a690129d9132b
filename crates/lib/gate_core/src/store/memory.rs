//! In-memory credential store backed by `DashMap`.
//!
//! Used by tests and for running the API without Postgres. Version updates
//! happen while holding the row's shard lock, which gives the same atomicity
//! as the conditional `UPDATE` statements in the Postgres store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    AdminUpdate, AuditFilter, AuditLog, CredentialStore, ListQuery, NewAdmin, NewAuditEntry,
    NewUser, Page, StoreError, UserUpdate,
};
use crate::models::audit::AuditEntry;
use crate::models::auth::{Admin, AdminRole, User};
use crate::uuid::uuidv7;

#[derive(Debug, Clone)]
struct Row<T> {
    value: T,
    deleted_at: Option<DateTime<Utc>>,
}

impl<T> Row<T> {
    fn live(&self) -> Option<&T> {
        self.deleted_at.is_none().then_some(&self.value)
    }
}

/// Credential store held entirely in process memory.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: DashMap<Uuid, Row<User>>,
    admins: DashMap<Uuid, Row<Admin>>,
    // Serializes writes that must check a unique key first.
    unique_lock: Mutex<()>,
    // Insertion order.
    audit: Mutex<Vec<AuditEntry>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_phone_taken(&self, phone: &str, except: Option<Uuid>) -> bool {
        self.users.iter().any(|r| {
            r.live()
                .is_some_and(|u| u.phone == phone && Some(u.id) != except)
        })
    }

    fn live_username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.admins.iter().any(|r| {
            r.live()
                .is_some_and(|a| a.username == username && Some(a.id) != except)
        })
    }

    fn lock_unique(&self) -> std::sync::MutexGuard<'_, ()> {
        self.unique_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_audit(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        self.audit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn paginate<T: Clone>(
    mut rows: Vec<T>,
    query: &ListQuery,
    created_at: impl Fn(&T) -> DateTime<Utc>,
) -> Page<T> {
    rows.sort_by_key(|r| created_at(r));
    if query.newest_first {
        rows.reverse();
    }
    let total = rows.len() as u64;
    let items = match query.limit {
        Some(limit) => rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(limit as usize)
            .collect(),
        None => rows,
    };
    Page { items, total }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find_map(|r| r.live().filter(|u| u.phone == phone).cloned()))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).and_then(|r| r.live().cloned()))
    }

    async fn phone_exists(&self, phone: &str) -> Result<bool, StoreError> {
        Ok(self.live_phone_taken(phone, None))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let _guard = self.lock_unique();
        if self.live_phone_taken(&user.phone, None) {
            return Err(StoreError::Duplicate("phone"));
        }
        let now = Utc::now();
        let user = User {
            id: uuidv7(),
            phone: user.phone,
            password_hash: user.password_hash,
            token_version: 0,
            current_device_id: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(
            user.id,
            Row {
                value: user.clone(),
                deleted_at: None,
            },
        );
        Ok(user)
    }

    async fn update_user_session(
        &self,
        id: Uuid,
        expected_version: i64,
        new_version: i64,
        device_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let Some(mut row) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        if row.deleted_at.is_some() || row.value.token_version != expected_version {
            return Ok(false);
        }
        row.value.token_version = new_version;
        if let Some(device_id) = device_id {
            row.value.current_device_id = Some(device_id.to_string());
        }
        row.value.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_user(
        &self,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<Option<User>, StoreError> {
        let _guard = self.lock_unique();
        if let Some(phone) = &update.phone
            && self.live_phone_taken(phone, Some(id))
        {
            return Err(StoreError::Duplicate("phone"));
        }
        let Some(mut row) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        if row.deleted_at.is_some() {
            return Ok(None);
        }
        if let Some(phone) = update.phone {
            row.value.phone = phone;
        }
        if let Some(hash) = update.password_hash {
            row.value.password_hash = hash;
        }
        if update.bump_version {
            row.value.token_version += 1;
        }
        row.value.updated_at = Utc::now();
        Ok(Some(row.value.clone()))
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let Some(mut row) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        if row.deleted_at.is_some() {
            return Ok(false);
        }
        row.value.token_version += 1;
        row.deleted_at = Some(Utc::now());
        Ok(true)
    }

    async fn list_users(&self, query: &ListQuery) -> Result<Page<User>, StoreError> {
        let rows: Vec<User> = self
            .users
            .iter()
            .filter_map(|r| r.live().cloned())
            .filter(|u| {
                query
                    .search
                    .as_deref()
                    .is_none_or(|s| u.phone.contains(s))
            })
            .collect();
        Ok(paginate(rows, query, |u| u.created_at))
    }

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StoreError> {
        Ok(self
            .admins
            .iter()
            .find_map(|r| r.live().filter(|a| a.username == username).cloned()))
    }

    async fn find_admin_by_id(&self, id: Uuid) -> Result<Option<Admin>, StoreError> {
        Ok(self.admins.get(&id).and_then(|r| r.live().cloned()))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.live_username_taken(username, None))
    }

    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin, StoreError> {
        let _guard = self.lock_unique();
        if self.live_username_taken(&admin.username, None) {
            return Err(StoreError::Duplicate("username"));
        }
        let id = admin.id.unwrap_or_else(uuidv7);
        if self.admins.contains_key(&id) {
            return Err(StoreError::Duplicate("id"));
        }
        let now = Utc::now();
        let admin = Admin {
            id,
            username: admin.username,
            password_hash: admin.password_hash,
            role: admin.role,
            token_version: 0,
            created_at: now,
            updated_at: now,
        };
        self.admins.insert(
            id,
            Row {
                value: admin.clone(),
                deleted_at: None,
            },
        );
        Ok(admin)
    }

    async fn bump_admin_version(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        let Some(mut row) = self.admins.get_mut(&id) else {
            return Ok(None);
        };
        if row.deleted_at.is_some() {
            return Ok(None);
        }
        row.value.token_version += 1;
        row.value.updated_at = Utc::now();
        Ok(Some(row.value.token_version))
    }

    async fn update_admin(
        &self,
        id: Uuid,
        update: AdminUpdate,
    ) -> Result<Option<Admin>, StoreError> {
        let _guard = self.lock_unique();
        if let Some(username) = &update.username
            && self.live_username_taken(username, Some(id))
        {
            return Err(StoreError::Duplicate("username"));
        }
        let Some(mut row) = self.admins.get_mut(&id) else {
            return Ok(None);
        };
        if row.deleted_at.is_some() {
            return Ok(None);
        }
        if let Some(username) = update.username {
            row.value.username = username;
        }
        if let Some(hash) = update.password_hash {
            row.value.password_hash = hash;
        }
        if let Some(role) = update.role {
            row.value.role = role;
        }
        row.value.updated_at = Utc::now();
        Ok(Some(row.value.clone()))
    }

    async fn soft_delete_admin(&self, id: Uuid) -> Result<bool, StoreError> {
        let Some(mut row) = self.admins.get_mut(&id) else {
            return Ok(false);
        };
        if row.deleted_at.is_some() {
            return Ok(false);
        }
        row.value.token_version += 1;
        row.deleted_at = Some(Utc::now());
        Ok(true)
    }

    async fn list_admins(
        &self,
        query: &ListQuery,
        role: Option<AdminRole>,
    ) -> Result<Page<Admin>, StoreError> {
        let rows: Vec<Admin> = self
            .admins
            .iter()
            .filter_map(|r| r.live().cloned())
            .filter(|a| role.is_none_or(|role| a.role == role))
            .filter(|a| {
                query
                    .search
                    .as_deref()
                    .is_none_or(|s| a.username.contains(s))
            })
            .collect();
        Ok(paginate(rows, query, |a| a.created_at))
    }
}

#[async_trait]
impl AuditLog for MemoryCredentialStore {
    async fn record_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let entry = AuditEntry {
            id: uuidv7(),
            admin_id: entry.admin_id,
            admin_name: entry.admin_name,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            details: entry.details,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            status: entry.status,
            error_message: entry.error_message,
            created_at: Utc::now(),
        };
        self.lock_audit().push(entry.clone());
        Ok(entry)
    }

    async fn list_audit(
        &self,
        query: &ListQuery,
        filter: &AuditFilter,
    ) -> Result<Page<AuditEntry>, StoreError> {
        let rows: Vec<AuditEntry> = self
            .lock_audit()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(paginate(rows, query, |e| e.created_at))
    }

    async fn find_audit(&self, id: Uuid) -> Result<Option<AuditEntry>, StoreError> {
        Ok(self.lock_audit().iter().find(|e| e.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditStatus;

    fn new_user(phone: &str) -> NewUser {
        NewUser {
            phone: phone.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn live_phone_is_unique() {
        let store = MemoryCredentialStore::new();
        store.create_user(new_user("+111111")).await.unwrap();
        let err = store.create_user(new_user("+111111")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("phone")));
    }

    #[tokio::test]
    async fn soft_delete_hides_row_and_frees_phone() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("+222222")).await.unwrap();

        assert!(store.soft_delete_user(user.id).await.unwrap());
        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(store.find_user_by_phone("+222222").await.unwrap().is_none());
        assert!(!store.phone_exists("+222222").await.unwrap());
        assert!(!store.soft_delete_user(user.id).await.unwrap());

        let again = store.create_user(new_user("+222222")).await.unwrap();
        assert_ne!(again.id, user.id);
        assert_eq!(again.token_version, 0);
    }

    #[tokio::test]
    async fn session_update_is_compare_and_swap() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(new_user("+333333")).await.unwrap();

        assert!(
            store
                .update_user_session(user.id, 0, 1, Some("dev-a"))
                .await
                .unwrap()
        );
        // Stale expectation loses.
        assert!(!store.update_user_session(user.id, 0, 1, None).await.unwrap());

        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.token_version, 1);
        assert_eq!(user.current_device_id.as_deref(), Some("dev-a"));
    }

    #[tokio::test]
    async fn admin_bump_is_in_place() {
        let store = MemoryCredentialStore::new();
        let admin = store
            .create_admin(NewAdmin {
                id: None,
                username: "ops".into(),
                password_hash: "hash".into(),
                role: AdminRole::Standard,
            })
            .await
            .unwrap();
        assert_eq!(store.bump_admin_version(admin.id).await.unwrap(), Some(1));
        assert_eq!(store.bump_admin_version(admin.id).await.unwrap(), Some(2));
        assert_eq!(store.bump_admin_version(Uuid::new_v4()).await.unwrap(), None);
    }

    fn audit(admin_id: Uuid, action: &str, resource_type: &str) -> NewAuditEntry {
        NewAuditEntry {
            admin_id,
            admin_name: "root".into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: Uuid::new_v4().to_string(),
            details: None,
            ip_address: None,
            user_agent: None,
            status: AuditStatus::Success,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn audit_log_filters_and_pages_newest_first() {
        let store = MemoryCredentialStore::new();
        let root = Uuid::new_v4();
        let ops = Uuid::new_v4();
        let first = store
            .record_audit(audit(root, "create_user", "user"))
            .await
            .unwrap();
        store
            .record_audit(audit(root, "delete_user", "user"))
            .await
            .unwrap();
        store
            .record_audit(audit(ops, "update_admin", "admin"))
            .await
            .unwrap();
        let last = store
            .record_audit(audit(root, "create_admin", "admin"))
            .await
            .unwrap();

        let all = store
            .list_audit(&ListQuery::default(), &AuditFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 4);
        assert_eq!(all.items[0].id, last.id);
        assert_eq!(all.items[3].id, first.id);

        let by_root = AuditFilter {
            admin_id: Some(root),
            ..AuditFilter::default()
        };
        let page = store
            .list_audit(
                &ListQuery {
                    page: 2,
                    limit: Some(2),
                    ..ListQuery::default()
                },
                &by_root,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, first.id);

        let admins = AuditFilter {
            resource_type: Some("admin".into()),
            action: Some("update_admin".into()),
            ..AuditFilter::default()
        };
        let page = store
            .list_audit(&ListQuery::default(), &admins)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].admin_id, ops);

        assert_eq!(
            store.find_audit(first.id).await.unwrap().unwrap().action,
            "create_user"
        );
        assert!(store.find_audit(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let store = MemoryCredentialStore::new();
        for i in 0..5 {
            store
                .create_user(new_user(&format!("+7000000{i}")))
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let page = store
            .list_users(&ListQuery {
                page: 2,
                limit: Some(2),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        let phones: Vec<_> = page.items.iter().map(|u| u.phone.as_str()).collect();
        assert_eq!(phones, ["+70000002", "+70000001"]);
    }
}
