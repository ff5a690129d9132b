//! Request and response bodies.

use chrono::{DateTime, Utc};
use gate_core::models::audit::{AuditEntry, AuditStatus};
use gate_core::models::auth::{Admin, AdminRole, User};
use gate_core::store::{AuditFilter, ListQuery, Page};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Default and maximum page size for list endpoints.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Page size used when a non-positive limit other than `-1` is requested.
const FALLBACK_PAGE_SIZE: u32 = 10;

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

/// Success envelope: `{ success: true, message, data }`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub status: String,
    pub version: String,
    pub store_connected: bool,
}

// ---------------------------------------------------------------------------
// User auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
}

/// Device id may also arrive as `?deviceId=` or `?device_id=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "deviceId")]
    pub device_id_camel: Option<String>,
    pub device_id: Option<String>,
}

impl LoginQuery {
    /// First non-empty device id: `deviceId` query, `device_id` query, body.
    pub fn resolve<'a>(&'a self, body: Option<&'a str>) -> Option<&'a str> {
        [self.device_id_camel.as_deref(), self.device_id.as_deref(), body]
            .into_iter()
            .flatten()
            .find(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRef {
    pub id: Uuid,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    pub id: Uuid,
    pub phone: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_in: i64,
    pub refresh_expires_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshData {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneQuery {
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhoneAvailabilityResponse {
    pub success: bool,
    pub message: String,
    pub available: bool,
}

// ---------------------------------------------------------------------------
// Admin auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginData {
    pub id: Uuid,
    pub username: String,
    pub role: AdminRole,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRef {
    pub id: Uuid,
    pub username: String,
    pub role: AdminRole,
}

// ---------------------------------------------------------------------------
// Management
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            phone: u.phone,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDto {
    pub id: Uuid,
    pub username: String,
    pub role: AdminRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Admin> for AdminDto {
    fn from(a: Admin) -> Self {
        Self {
            id: a.id,
            username: a.username,
            role: a.role,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdminRequest {
    pub username: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAdminRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Parse a role name, rejecting anything but `super` / `regular`.
pub fn parse_role(raw: &str) -> Result<AdminRole, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation("Invalid role. Must be 'super' or 'regular'".into()))
}

/// `?page=&limit=&search=&order=&role=` on list endpoints.
///
/// `limit=-1` returns everything; other non-positive limits fall back to 10.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub order: Option<String>,
    pub role: Option<String>,
}

impl ListParams {
    pub fn to_query(&self) -> ListQuery {
        let page = self
            .page
            .filter(|p| *p >= 1)
            .map_or(1, |p| u32::try_from(p).unwrap_or(u32::MAX));
        let limit = match self.limit {
            None => Some(MAX_PAGE_SIZE),
            Some(-1) => None,
            Some(l) if l < 1 => Some(FALLBACK_PAGE_SIZE),
            Some(l) => Some(u32::try_from(l).unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE)),
        };
        ListQuery {
            page,
            limit,
            search: self.search.clone().filter(|s| !s.is_empty()),
            newest_first: !matches!(self.order.as_deref(), Some("ASC")),
        }
    }

    pub fn role_filter(&self) -> Result<Option<AdminRole>, AppError> {
        match self.role.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => parse_role(raw).map(Some),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

/// Default page size for the audit log.
pub const AUDIT_PAGE_SIZE: u32 = 20;

/// Largest audit log page; bigger requests get [`AUDIT_PAGE_SIZE`].
pub const MAX_AUDIT_PAGE_SIZE: u32 = 100;

/// `?page=&limit=&admin_id=&action=&resource_type=` on the audit log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub admin_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
}

impl AuditLogParams {
    /// Newest first. Limits outside `1..=100` fall back to 20.
    pub fn to_query(&self) -> ListQuery {
        let page = self
            .page
            .filter(|p| *p >= 1)
            .map_or(1, |p| u32::try_from(p).unwrap_or(u32::MAX));
        let limit = self
            .limit
            .and_then(|l| u32::try_from(l).ok())
            .filter(|l| (1..=MAX_AUDIT_PAGE_SIZE).contains(l))
            .unwrap_or(AUDIT_PAGE_SIZE);
        ListQuery {
            page,
            limit: Some(limit),
            search: None,
            newest_first: true,
        }
    }

    pub fn filter(&self) -> Result<AuditFilter, AppError> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let admin_id = non_empty(&self.admin_id)
            .map(|raw| {
                raw.parse::<Uuid>()
                    .map_err(|_| AppError::Validation("Invalid admin_id".into()))
            })
            .transpose()?;
        Ok(AuditFilter {
            admin_id,
            action: non_empty(&self.action),
            resource_type: non_empty(&self.resource_type),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogDto {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

impl From<AuditEntry> for AuditLogDto {
    fn from(e: AuditEntry) -> Self {
        Self {
            id: e.id,
            admin_id: e.admin_id,
            admin_name: e.admin_name,
            action: e.action,
            resource_type: e.resource_type,
            resource_id: e.resource_id,
            details: e.details,
            ip_address: e.ip_address,
            user_agent: e.user_agent,
            status: e.status,
            error_message: e.error_message,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total: u64,
    pub per_page: u64,
    pub current_page: u32,
    pub last_page: u64,
}

/// List envelope with pagination metadata next to `data`.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new<S>(message: impl Into<String>, page: Page<S>, query: &ListQuery) -> Self
    where
        T: From<S>,
    {
        let (per_page, last_page) = match query.limit {
            Some(limit) => {
                let limit = u64::from(limit);
                (limit, page.total.div_ceil(limit).max(1))
            }
            None => (page.total, 1),
        };
        Self {
            success: true,
            message: message.into(),
            data: page.items.into_iter().map(T::from).collect(),
            pagination: PaginationMeta {
                total: page.total,
                per_page,
                current_page: query.page,
                last_page,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_defaults() {
        let q = ListParams::default().to_query();
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, Some(MAX_PAGE_SIZE));
        assert!(q.newest_first);
        assert!(q.search.is_none());
    }

    #[test]
    fn list_params_limits() {
        let with = |limit| {
            ListParams {
                limit: Some(limit),
                ..ListParams::default()
            }
            .to_query()
            .limit
        };
        assert_eq!(with(-1), None);
        assert_eq!(with(0), Some(10));
        assert_eq!(with(10_000), Some(MAX_PAGE_SIZE));
        assert_eq!(with(25), Some(25));
    }

    #[test]
    fn list_params_order_and_page() {
        let q = ListParams {
            page: Some(-3),
            order: Some("ASC".into()),
            search: Some(String::new()),
            ..ListParams::default()
        }
        .to_query();
        assert_eq!(q.page, 1);
        assert!(!q.newest_first);
        assert!(q.search.is_none());
    }

    #[test]
    fn role_filter_rejects_unknown() {
        let params = ListParams {
            role: Some("owner".into()),
            ..ListParams::default()
        };
        assert!(matches!(params.role_filter(), Err(AppError::Validation(_))));
    }

    #[test]
    fn device_id_precedence() {
        let q = LoginQuery {
            device_id_camel: Some(String::new()),
            device_id: Some("from-query".into()),
        };
        assert_eq!(q.resolve(Some("from-body")), Some("from-query"));
        assert_eq!(LoginQuery::default().resolve(Some("from-body")), Some("from-body"));
        assert_eq!(LoginQuery::default().resolve(Some("")), None);
    }

    #[test]
    fn pagination_meta() {
        let query = ListQuery {
            page: 2,
            limit: Some(2),
            ..ListQuery::default()
        };
        let page = Page {
            items: vec![1u8, 2],
            total: 5,
        };
        let resp: PaginatedResponse<u16> = PaginatedResponse::new("ok", page, &query);
        assert_eq!(resp.pagination.per_page, 2);
        assert_eq!(resp.pagination.last_page, 3);
        assert_eq!(resp.pagination.current_page, 2);
        assert_eq!(resp.data, vec![1, 2]);
    }

    #[test]
    fn audit_params_clamp_limit() {
        let q = AuditLogParams::default().to_query();
        assert_eq!((q.page, q.limit), (1, Some(AUDIT_PAGE_SIZE)));
        assert!(q.newest_first);

        for (raw, expected) in [(50, 50), (100, 100), (101, 20), (0, 20), (-1, 20)] {
            let q = AuditLogParams {
                limit: Some(raw),
                ..AuditLogParams::default()
            }
            .to_query();
            assert_eq!(q.limit, Some(expected), "limit={raw}");
        }
    }

    #[test]
    fn audit_params_filters() {
        let id = Uuid::new_v4();
        let filter = AuditLogParams {
            admin_id: Some(id.to_string()),
            action: Some(String::new()),
            resource_type: Some("user".into()),
            ..AuditLogParams::default()
        }
        .filter()
        .unwrap();
        assert_eq!(filter.admin_id, Some(id));
        assert_eq!(filter.action, None);
        assert_eq!(filter.resource_type.as_deref(), Some("user"));

        let err = AuditLogParams {
            admin_id: Some("nope".into()),
            ..AuditLogParams::default()
        }
        .filter()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
