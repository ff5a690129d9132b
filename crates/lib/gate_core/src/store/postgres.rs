//! Postgres credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AdminUpdate, AuditFilter, AuditLog, CredentialStore, ListQuery, NewAdmin, NewAuditEntry,
    NewUser, Page, StoreError, UserUpdate,
};
use crate::models::audit::{AuditEntry, AuditStatus};
use crate::models::auth::{Admin, AdminRole, User};
use crate::uuid::uuidv7;

const USER_COLUMNS: &str =
    "id, phone, password_hash, token_version, current_device_id, created_at, updated_at";

const ADMIN_COLUMNS: &str =
    "id, username, password_hash, role, token_version, created_at, updated_at";

const AUDIT_COLUMNS: &str = "id, admin_id, admin_name, action, resource_type, resource_id, \
     details, ip_address, user_agent, status, error_message, created_at";

type UserRow = (
    Uuid,
    String,
    String,
    i64,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type AdminRow = (
    Uuid,
    String,
    String,
    String,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    admin_id: Uuid,
    admin_name: String,
    action: String,
    resource_type: String,
    resource_id: String,
    details: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AuditStatus>()
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(AuditEntry {
            id: row.id,
            admin_id: row.admin_id,
            admin_name: row.admin_name,
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            status,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

fn user_from_row(
    (id, phone, password_hash, token_version, current_device_id, created_at, updated_at): UserRow,
) -> User {
    User {
        id,
        phone,
        password_hash,
        token_version,
        current_device_id: current_device_id.filter(|d| !d.is_empty()),
        created_at,
        updated_at,
    }
}

fn admin_from_row(
    (id, username, password_hash, role, token_version, created_at, updated_at): AdminRow,
) -> Result<Admin, StoreError> {
    let role = role
        .parse::<AdminRole>()
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))?;
    Ok(Admin {
        id,
        username,
        password_hash,
        role,
        token_version,
        created_at,
        updated_at,
    })
}

/// Map a unique-index violation to [`StoreError::Duplicate`].
fn unique_as(field: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
        {
            return StoreError::Duplicate(field);
        }
        StoreError::Database(e)
    }
}

fn order(query: &ListQuery) -> &'static str {
    if query.newest_first { "DESC" } else { "ASC" }
}

/// [`CredentialStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1 AND deleted_at IS NULL"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn phone_exists(&self, phone: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE phone = $1 AND deleted_at IS NULL)",
        )
        .bind(phone)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, phone, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(&user.phone)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as("phone"))?;
        Ok(user_from_row(row))
    }

    async fn update_user_session(
        &self,
        id: Uuid,
        expected_version: i64,
        new_version: i64,
        device_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users \
             SET token_version = $3, \
                 current_device_id = COALESCE($4, current_device_id), \
                 updated_at = now() \
             WHERE id = $1 AND token_version = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(expected_version)
        .bind(new_version)
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_user(
        &self,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users \
             SET phone = COALESCE($2, phone), \
                 password_hash = COALESCE($3, password_hash), \
                 token_version = token_version + CASE WHEN $4 THEN 1 ELSE 0 END, \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.phone)
        .bind(update.password_hash)
        .bind(update.bump_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(unique_as("phone"))?;
        Ok(row.map(user_from_row))
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users \
             SET deleted_at = now(), token_version = token_version + 1, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_users(&self, query: &ListQuery) -> Result<Page<User>, StoreError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users \
             WHERE deleted_at IS NULL AND ($1::text IS NULL OR phone LIKE '%' || $1 || '%')",
        )
        .bind(query.search.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE deleted_at IS NULL AND ($1::text IS NULL OR phone LIKE '%' || $1 || '%') \
             ORDER BY created_at {} \
             LIMIT $2 OFFSET $3",
            order(query)
        ))
        .bind(query.search.as_deref())
        .bind(query.limit.map(i64::from))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: rows.into_iter().map(user_from_row).collect(),
            total: total as u64,
        })
    }

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StoreError> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins WHERE username = $1 AND deleted_at IS NULL"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(admin_from_row).transpose()
    }

    async fn find_admin_by_id(&self, id: Uuid) -> Result<Option<Admin>, StoreError> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(admin_from_row).transpose()
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM admins WHERE username = $1 AND deleted_at IS NULL)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin, StoreError> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "INSERT INTO admins (id, username, password_hash, role) VALUES ($1, $2, $3, $4) \
             RETURNING {ADMIN_COLUMNS}"
        ))
        .bind(admin.id.unwrap_or_else(uuidv7))
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(admin.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unique_as("username"))?;
        admin_from_row(row)
    }

    async fn bump_admin_version(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        let version = sqlx::query_scalar::<_, i64>(
            "UPDATE admins SET token_version = token_version + 1, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING token_version",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }

    async fn update_admin(
        &self,
        id: Uuid,
        update: AdminUpdate,
    ) -> Result<Option<Admin>, StoreError> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "UPDATE admins \
             SET username = COALESCE($2, username), \
                 password_hash = COALESCE($3, password_hash), \
                 role = COALESCE($4, role), \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {ADMIN_COLUMNS}"
        ))
        .bind(id)
        .bind(update.username)
        .bind(update.password_hash)
        .bind(update.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(unique_as("username"))?;
        row.map(admin_from_row).transpose()
    }

    async fn soft_delete_admin(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE admins \
             SET deleted_at = now(), token_version = token_version + 1, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_admins(
        &self,
        query: &ListQuery,
        role: Option<AdminRole>,
    ) -> Result<Page<Admin>, StoreError> {
        let filter = "deleted_at IS NULL \
             AND ($1::text IS NULL OR username LIKE '%' || $1 || '%') \
             AND ($2::text IS NULL OR role = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM admins WHERE {filter}"
        ))
        .bind(query.search.as_deref())
        .bind(role.map(|r| r.as_str()))
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins WHERE {filter} \
             ORDER BY created_at {} \
             LIMIT $3 OFFSET $4",
            order(query)
        ))
        .bind(query.search.as_deref())
        .bind(role.map(|r| r.as_str()))
        .bind(query.limit.map(i64::from))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(admin_from_row)
                .collect::<Result<_, _>>()?,
            total: total as u64,
        })
    }
}

#[async_trait]
impl AuditLog for PgCredentialStore {
    async fn record_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            "INSERT INTO admin_audit_logs \
             (id, admin_id, admin_name, action, resource_type, resource_id, \
              details, ip_address, user_agent, status, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {AUDIT_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(entry.admin_id)
        .bind(&entry.admin_name)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(entry.details.as_deref())
        .bind(entry.ip_address.as_deref())
        .bind(entry.user_agent.as_deref())
        .bind(entry.status.as_str())
        .bind(entry.error_message.as_deref())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn list_audit(
        &self,
        query: &ListQuery,
        filter: &AuditFilter,
    ) -> Result<Page<AuditEntry>, StoreError> {
        let conditions = "($1::uuid IS NULL OR admin_id = $1) \
             AND ($2::text IS NULL OR action = $2) \
             AND ($3::text IS NULL OR resource_type = $3)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM admin_audit_logs WHERE {conditions}"
        ))
        .bind(filter.admin_id)
        .bind(filter.action.as_deref())
        .bind(filter.resource_type.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM admin_audit_logs WHERE {conditions} \
             ORDER BY created_at {0}, id {0} \
             LIMIT $4 OFFSET $5",
            order(query)
        ))
        .bind(filter.admin_id)
        .bind(filter.action.as_deref())
        .bind(filter.resource_type.as_deref())
        .bind(query.limit.map(i64::from))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(AuditEntry::try_from)
                .collect::<Result<_, _>>()?,
            total: total as u64,
        })
    }

    async fn find_audit(&self, id: Uuid) -> Result<Option<AuditEntry>, StoreError> {
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM admin_audit_logs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AuditEntry::try_from).transpose()
    }
}
