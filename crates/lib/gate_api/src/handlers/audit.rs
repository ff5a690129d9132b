//! Audit log handlers. Both routes sit behind the elevated role gate.

use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{ApiResponse, AuditLogDto, AuditLogParams, PaginatedResponse};
use crate::services::audit;

/// `GET /api/v1/admin/audit-logs`: `?page=&limit=&admin_id=&action=&resource_type=`.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<PaginatedResponse<AuditLogDto>>> {
    let query = params.to_query();
    let page = audit::list_audit_logs(&state, &params).await?;
    Ok(Json(PaginatedResponse::new(
        "Audit logs retrieved successfully",
        page,
        &query,
    )))
}

/// `GET /api/v1/admin/audit-logs/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<AuditLogDto>>> {
    let entry = audit::get_audit_log(&state, id).await?;
    Ok(Json(ApiResponse::ok(
        "Audit log retrieved successfully",
        entry.into(),
    )))
}
