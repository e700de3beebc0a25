//! Voucher HTTP handlers
//!
//! Lifecycle endpoints plus the purchase gate and lock release.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::voucher::{
    CreateVoucherRequest, GateOutcome, ListVouchersQuery, UpdateVoucherRequest, Voucher,
};

/// POST /api/vouchers - List a new voucher
pub async fn create_voucher(
    State(state): State<AppState>,
    Json(req): Json<CreateVoucherRequest>,
) -> Result<(StatusCode, Json<Voucher>), ApiError> {
    req.validate()?;
    let voucher = state.voucher_service.create_voucher(req).await?;
    Ok((StatusCode::CREATED, Json(voucher)))
}

/// GET /api/vouchers - List vouchers with filters and pagination
pub async fn list_vouchers(
    State(state): State<AppState>,
    Query(query): Query<ListVouchersQuery>,
) -> Result<Json<Vec<Voucher>>, ApiError> {
    let vouchers = state.voucher_service.list_vouchers(query).await?;
    Ok(Json(vouchers))
}

/// GET /api/vouchers/:id - Get a single voucher
pub async fn get_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<Uuid>,
) -> Result<Json<Voucher>, ApiError> {
    let voucher = state.voucher_service.get_voucher(voucher_id).await?;
    Ok(Json(voucher))
}

/// PATCH /api/vouchers/:id - Update a voucher
pub async fn update_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<Uuid>,
    Json(req): Json<UpdateVoucherRequest>,
) -> Result<Json<Voucher>, ApiError> {
    req.validate()?;
    let voucher = state
        .voucher_service
        .update_voucher(voucher_id, req)
        .await?;
    Ok(Json(voucher))
}

#[derive(Debug, Deserialize)]
pub struct GateRequest {
    pub buyer_id: Uuid,
}

/// POST /api/vouchers/:id/purchase - Purchase gate
///
/// Always answers 200; the body's `outcome` field distinguishes a cleared
/// gate (lock held) from a rejection.
pub async fn validate_for_usage(
    State(state): State<AppState>,
    Path(voucher_id): Path<Uuid>,
    Json(req): Json<GateRequest>,
) -> Result<Json<GateOutcome>, ApiError> {
    let outcome = state
        .voucher_service
        .validate_for_usage(voucher_id, req.buyer_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/vouchers/:id/unlock - Release a processing lock
pub async fn unlock_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.voucher_service.unlock_voucher(voucher_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
