//! # gate_api
//!
//! HTTP API library for the gate service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use gate_core::auth::guard::{AccessGuard, RoleGate};
use gate_core::auth::jwt::TokenCodec;
use gate_core::auth::password::{BcryptHasher, PasswordHasher};
use gate_core::auth::session::SessionIssuer;
use gate_core::models::auth::AdminRole;
use gate_core::store::{AuditLog, CredentialStore};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ApiConfig;
use crate::handlers::{admin_auth, admins, audit, auth, health, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Users and admins.
    pub store: Arc<dyn CredentialStore>,
    /// Record of admin actions.
    pub audit: Arc<dyn AuditLog>,
    pub hasher: Arc<dyn PasswordHasher>,
    /// Register / login / refresh.
    pub sessions: SessionIssuer,
    /// Bearer token checks used by the auth middleware.
    pub guard: AccessGuard,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the auth components over `store` with bcrypt at the configured cost.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditLog>,
        config: ApiConfig,
    ) -> Self {
        let hasher: Arc<dyn PasswordHasher> =
            Arc::new(BcryptHasher::new(config.auth.bcrypt_cost));
        Self::with_hasher(store, audit, hasher, config)
    }

    pub fn with_hasher(
        store: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditLog>,
        hasher: Arc<dyn PasswordHasher>,
        config: ApiConfig,
    ) -> Self {
        let codec = TokenCodec::new(&config.auth);
        Self {
            sessions: SessionIssuer::new(store.clone(), hasher.clone(), codec.clone()),
            guard: AccessGuard::new(store.clone(), codec),
            store,
            audit,
            hasher,
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `gate_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    gate_core::migrate::migrate(pool).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| {
            HeaderValue::from_str(o)
                .inspect_err(|e| warn!(origin = %o, "ignoring CORS origin: {e}"))
                .ok()
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);
    let elevated = || {
        from_fn_with_state(
            RoleGate::new(AdminRole::Elevated),
            middleware::auth::role_gate,
        )
    };

    // Public routes (no auth required)
    let public = Router::new()
        .route("/", get(health::health_handler))
        .route("/api/v1/auth/register", post(auth::register_handler))
        .route("/api/v1/auth/login", post(auth::login_handler))
        .route("/api/v1/auth/refresh", post(auth::refresh_handler))
        .route("/api/v1/auth/check-phone", get(auth::check_phone_handler))
        .route("/api/v1/admin/login", post(admin_auth::login_handler));

    // User routes (access token)
    let user = Router::new()
        .route("/api/v1/me", get(auth::me_handler))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_user,
        ));

    // Admin routes (admin token); elevated-only methods carry the role gate.
    let admin = Router::new()
        .route("/api/v1/admin/me", get(admin_auth::me_handler))
        .route(
            "/api/v1/admin/users",
            get(admins::list_handler)
                .post(admins::create_handler)
                .route_layer(elevated()),
        )
        .route(
            "/api/v1/admin/users/{id}",
            get(admins::get_handler)
                .patch(admins::update_handler)
                .merge(delete(admins::delete_handler).route_layer(elevated())),
        )
        .route(
            "/api/v1/admin/audit-logs",
            get(audit::list_handler).route_layer(elevated()),
        )
        .route(
            "/api/v1/admin/audit-logs/{id}",
            get(audit::get_handler).route_layer(elevated()),
        )
        .route(
            "/api/v1/users",
            get(users::list_handler).post(users::create_handler),
        )
        .route(
            "/api/v1/users/{id}",
            get(users::get_handler)
                .patch(users::update_handler)
                .delete(users::delete_handler),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(user)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
