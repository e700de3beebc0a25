//! Fraud HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::fraud::{Assessment, FraudIncident};

#[derive(Debug, Deserialize, Default)]
pub struct IncidentsQuery {
    pub limit: Option<i64>,
}

/// GET /api/fraud/incidents - Most recent incidents, newest first
pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentsQuery>,
) -> Result<Json<Vec<FraudIncident>>, ApiError> {
    let incidents = state
        .fraud_engine
        .recent_incidents(query.limit.unwrap_or(50))
        .await?;
    Ok(Json(incidents))
}

/// POST /api/vouchers/:id/failed-attempt - Record a failed redemption attempt
pub async fn report_failed_attempt(
    State(state): State<AppState>,
    Path(voucher_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let attempts = state.fraud_engine.report_failed_attempt(voucher_id).await?;
    Ok(Json(serde_json::json!({ "attempts": attempts })))
}

/// POST /api/fraud/analyze/voucher/:id - Re-run fraud analysis on a voucher
///
/// Runs the combined voucher-and-owner pass so a Critical verdict on either
/// side takes effect immediately.
pub async fn analyze_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (voucher_assessment, owner_assessment) =
        state.voucher_service.verify_and_analyze(voucher_id).await?;
    Ok(Json(serde_json::json!({
        "voucher": voucher_assessment,
        "owner": owner_assessment,
    })))
}

/// POST /api/fraud/analyze/user/:id - Re-run fraud analysis on a user
pub async fn analyze_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Assessment>, ApiError> {
    let assessment = state.fraud_engine.analyze_user(user_id).await?;
    Ok(Json(assessment))
}
