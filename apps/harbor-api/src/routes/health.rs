//! Liveness and database connectivity.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.engine.db().health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if database { "healthy" } else { "degraded" },
            "database": database,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": state.engine.now(),
        })),
    )
}
