//! Admin authentication handlers.

use axum::extract::State;
use axum::{Extension, Json};
use gate_core::auth::guard::AdminContext;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{AdminLoginData, AdminLoginRequest, AdminRef, ApiResponse};

/// `POST /api/v1/admin/login`: issue a non-expiring admin token. Any token
/// from an earlier login stops working.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<AdminLoginRequest>,
) -> AppResult<Json<ApiResponse<AdminLoginData>>> {
    let session = state
        .sessions
        .login_admin(&body.username, &body.password)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Login successful",
        AdminLoginData {
            id: session.admin_id,
            username: session.username,
            role: session.role,
            access_token: session.token,
        },
    )))
}

/// `GET /api/v1/admin/me`: the authenticated admin with its live role.
pub async fn me_handler(Extension(admin): Extension<AdminContext>) -> Json<ApiResponse<AdminRef>> {
    Json(ApiResponse::ok(
        "Admin retrieved successfully",
        AdminRef {
            id: admin.id,
            username: admin.username,
            role: admin.role,
        },
    ))
}
