//! Admin management handlers.
//!
//! List, create and delete sit behind the elevated role gate; get and update
//! apply the own-record rules in [`accounts`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::actor::Actor;
use crate::models::{
    AdminDto, AdminRef, ApiResponse, CreateAdminRequest, ListParams, PaginatedResponse,
    UpdateAdminRequest,
};
use crate::services::accounts;

/// `GET /api/v1/admin/users`: `?page=&limit=&search=&order=&role=`.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<PaginatedResponse<AdminDto>>> {
    let query = params.to_query();
    let page = accounts::list_admins(&state, &params).await?;
    Ok(Json(PaginatedResponse::new(
        "Admins retrieved successfully",
        page,
        &query,
    )))
}

/// `POST /api/v1/admin/users`
pub async fn create_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateAdminRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AdminRef>>)> {
    let created = accounts::create_admin(&state, &actor, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Admin created successfully",
            AdminRef {
                id: created.id,
                username: created.username,
                role: created.role,
            },
        )),
    ))
}

/// `GET /api/v1/admin/users/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<AdminDto>>> {
    let found = accounts::get_admin(&state, &actor, id).await?;
    Ok(Json(ApiResponse::ok(
        "Admin retrieved successfully",
        found.into(),
    )))
}

/// `PATCH /api/v1/admin/users/{id}`
pub async fn update_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAdminRequest>,
) -> AppResult<Json<ApiResponse<AdminRef>>> {
    let updated = accounts::update_admin(&state, &actor, id, body).await?;
    Ok(Json(ApiResponse::ok(
        "Admin updated successfully",
        AdminRef {
            id: updated.id,
            username: updated.username,
            role: updated.role,
        },
    )))
}

/// `DELETE /api/v1/admin/users/{id}`
pub async fn delete_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<AdminRef>>> {
    let deleted = accounts::delete_admin(&state, &actor, id).await?;
    Ok(Json(ApiResponse::ok(
        "Admin deleted successfully",
        AdminRef {
            id: deleted.id,
            username: deleted.username,
            role: deleted.role,
        },
    )))
}
