//! User management handlers (admin-guarded).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::actor::Actor;
use crate::models::{
    ApiResponse, CreateUserRequest, ListParams, PaginatedResponse, PrincipalRef,
    UpdateUserRequest, UserDto,
};
use crate::services::accounts;

/// `GET /api/v1/users`: newest first, `?page=&limit=&search=&order=`.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<PaginatedResponse<UserDto>>> {
    let query = params.to_query();
    let page = accounts::list_users(&state, &params).await?;
    Ok(Json(PaginatedResponse::new(
        "Users retrieved successfully",
        page,
        &query,
    )))
}

/// `POST /api/v1/users`
pub async fn create_handler(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PrincipalRef>>)> {
    let user = accounts::create_user(&state, &actor, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User created successfully",
            PrincipalRef {
                id: user.id,
                phone: user.phone,
            },
        )),
    ))
}

/// `GET /api/v1/users/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserDto>>> {
    let user = accounts::get_user(&state, id).await?;
    Ok(Json(ApiResponse::ok(
        "User retrieved successfully",
        user.into(),
    )))
}

/// `PATCH /api/v1/users/{id}`: a new password or phone logs the user out
/// everywhere.
pub async fn update_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserDto>>> {
    let user = accounts::update_user(&state, &actor, id, body).await?;
    Ok(Json(ApiResponse::ok("User updated successfully", user.into())))
}

/// `DELETE /api/v1/users/{id}`
pub async fn delete_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PrincipalRef>>> {
    let user = accounts::delete_user(&state, &actor, id).await?;
    Ok(Json(ApiResponse::ok(
        "User deleted successfully",
        PrincipalRef {
            id: user.id,
            phone: user.phone,
        },
    )))
}
