//! Health check.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /`: reports the crate version and whether the store answers.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("store ping failed: {e}");
            false
        }
    };

    Json(HealthResponse {
        success: true,
        message: "Gate API is running".into(),
        status: if store_connected { "healthy" } else { "degraded" }.into(),
        version: gate_core::version().into(),
        store_connected,
    })
}
