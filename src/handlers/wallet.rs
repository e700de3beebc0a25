//! Wallet HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::wallet::{
    AddTransactionRequest, TransactionHistoryQuery, WalletSummary, WalletTransaction,
};

/// GET /api/wallets/:user_id - Wallet balance plus recent history
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<TransactionHistoryQuery>,
) -> Result<Json<WalletSummary>, ApiError> {
    let wallet = state.wallet_service.get_or_create_wallet(user_id).await?;
    let recent_transactions = state
        .wallet_service
        .recent_transactions(user_id, query.limit.unwrap_or(20))
        .await?;
    Ok(Json(WalletSummary {
        wallet,
        recent_transactions,
    }))
}

/// POST /api/wallets/:user_id/transactions - Post a credit or debit
pub async fn add_transaction(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AddTransactionRequest>,
) -> Result<(StatusCode, Json<WalletTransaction>), ApiError> {
    req.validate()?;
    let entry = state
        .wallet_service
        .add_transaction(
            user_id,
            req.kind,
            req.amount,
            req.reference.as_deref(),
            req.description.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/wallets/:user_id/transactions - Transaction history, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<TransactionHistoryQuery>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    let limit = query.limit.unwrap_or(50);
    let entries = state.wallet_service.recent_transactions(user_id, limit).await?;
    Ok(Json(entries))
}
