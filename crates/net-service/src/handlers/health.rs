//! Liveness and readiness probes.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Handler for GET /health
///
/// 200 once the process has started serving.
#[instrument(skip_all, name = "net.health.live")]
pub async fn liveness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    if state.health.is_live() {
        (StatusCode::OK, Json(HealthResponse { status: "ok" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse { status: "starting" }),
        )
    }
}

/// Handler for GET /ready
///
/// 200 when the service accepts traffic and the database answers. Returns
/// 503 during shutdown so load balancers stop routing.
#[instrument(skip_all, name = "net.health.ready")]
pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    if !state.health.is_ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready",
            }),
        );
    }

    if let Err(e) = sqlx::query("SELECT 1").execute(&state.pool).await {
        warn!(target: "net.handlers", error = %e, "Readiness database ping failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "database_unavailable",
            }),
        );
    }

    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}
