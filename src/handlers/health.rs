//! Health check handler

use axum::{extract::State, http::StatusCode, Json};

use crate::app_state::AppState;
use crate::db;

/// GET /health - Liveness plus a database round trip
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    match db::check_health(&state.db_pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "database": "ok" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check database probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "degraded", "database": "unreachable" })),
            )
        }
    }
}
