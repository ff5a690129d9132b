//! User authentication handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use gate_core::auth::guard::UserContext;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    ApiResponse, LoginData, LoginQuery, LoginRequest, PhoneAvailabilityResponse, PhoneQuery,
    PrincipalRef, RefreshData, RefreshRequest, RegisterRequest,
};
use crate::services::accounts;

/// `POST /api/v1/auth/register`: create a phone user at token version 0.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PrincipalRef>>)> {
    let id = state
        .sessions
        .register_user(&body.phone, &body.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User registered successfully",
            PrincipalRef {
                id,
                phone: body.phone,
            },
        )),
    ))
}

/// `POST /api/v1/auth/login`: issue an access + refresh pair.
///
/// Logging in without a device id, or from a device other than the stored
/// one, invalidates every earlier token of the user.
pub async fn login_handler(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginData>>> {
    let device_id = query.resolve(body.device_id.as_deref());
    let session = state
        .sessions
        .login_user(&body.phone, &body.password, device_id)
        .await?;

    Ok(Json(ApiResponse::ok(
        "Login successful",
        LoginData {
            id: session.user_id,
            phone: session.phone,
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            access_expires_in: session.tokens.access_expires_in,
            refresh_expires_in: session.tokens.refresh_expires_in,
        },
    )))
}

/// `POST /api/v1/auth/refresh`: new access token at the same version.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<RefreshData>>> {
    let access_token = state
        .sessions
        .refresh_user_access(&body.refresh_token)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Token refreshed successfully",
        RefreshData { access_token },
    )))
}

/// `GET /api/v1/auth/check-phone?phone=`: whether a phone can register.
pub async fn check_phone_handler(
    State(state): State<AppState>,
    Query(query): Query<PhoneQuery>,
) -> AppResult<Json<PhoneAvailabilityResponse>> {
    let available = accounts::phone_available(&state, &query.phone).await?;
    Ok(Json(PhoneAvailabilityResponse {
        success: true,
        message: "Phone availability checked".into(),
        available,
    }))
}

/// `GET /api/v1/me`: the authenticated user.
pub async fn me_handler(
    Extension(user): Extension<UserContext>,
) -> Json<ApiResponse<PrincipalRef>> {
    Json(ApiResponse::ok(
        "User retrieved successfully",
        PrincipalRef {
            id: user.id,
            phone: user.phone,
        },
    ))
}
