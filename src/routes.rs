//! Route definitions for the voucher marketplace API

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::*;

// Voucher routes
pub fn voucher_routes() -> Router<AppState> {
    Router::new()
        .route("/api/vouchers", post(create_voucher))
        .route("/api/vouchers", get(list_vouchers))
        .route("/api/vouchers/:id", get(get_voucher))
        .route("/api/vouchers/:id", patch(update_voucher))
        .route("/api/vouchers/:id/purchase", post(validate_for_usage))
        .route("/api/vouchers/:id/unlock", post(unlock_voucher))
        .route("/api/vouchers/:id/failed-attempt", post(report_failed_attempt))
}

// Wallet routes
pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wallets/:user_id", get(get_wallet))
        .route("/api/wallets/:user_id/transactions", post(add_transaction))
        .route("/api/wallets/:user_id/transactions", get(list_transactions))
}

// Fraud routes
pub fn fraud_routes() -> Router<AppState> {
    Router::new()
        .route("/api/fraud/incidents", get(list_incidents))
        .route("/api/fraud/analyze/voucher/:id", post(analyze_voucher))
        .route("/api/fraud/analyze/user/:id", post(analyze_user))
}

// Sweep trigger routes
pub fn sweep_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sweeps/expiry", post(trigger_expiry_sweep))
        .route("/api/sweeps/fraud", post(trigger_fraud_sweep))
}
