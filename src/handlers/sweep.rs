//! Manual sweep triggers
//!
//! The sweeps run on a schedule; these endpoints run the same passes on
//! demand for operational use.

use axum::{extract::State, Json};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::voucher::SweepReport;

/// POST /api/sweeps/expiry - Trigger the expiry sweep immediately
pub async fn trigger_expiry_sweep(
    State(state): State<AppState>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state.sweeper.run_expiry_sweep().await?;
    Ok(Json(report))
}

/// POST /api/sweeps/fraud - Trigger the fraud sweep immediately
pub async fn trigger_fraud_sweep(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let analyzed = state.sweeper.run_fraud_sweep().await?;
    Ok(Json(serde_json::json!({ "analyzed": analyzed })))
}
