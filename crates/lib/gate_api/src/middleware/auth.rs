//! Authentication middleware: Bearer token checks and the role gate.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use gate_core::auth::guard::{AdminContext, RoleGate, UserContext};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

fn authorization(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Verifies a user access token and injects [`UserContext`] into request
/// extensions.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user: UserContext = state
        .guard
        .authorize_user(authorization(&request))
        .await
        .inspect_err(|e| debug!(path = %request.uri().path(), error = %e, "user auth rejected"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Verifies an admin token and injects [`AdminContext`] (with the live role)
/// into request extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let admin: AdminContext = state
        .guard
        .authorize_admin(authorization(&request))
        .await
        .inspect_err(|e| debug!(path = %request.uri().path(), error = %e, "admin auth rejected"))?;

    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}

/// Admits the request only if [`require_admin`] attached an admin holding the
/// gate's role. Mount with `from_fn_with_state(RoleGate::new(role), role_gate)`
/// inside the admin guard.
pub async fn role_gate(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    gate.check(request.extensions().get::<AdminContext>())
        .inspect_err(|e| debug!(required = %gate.required(), error = %e, "role gate rejected"))?;
    Ok(next.run(request).await)
}
