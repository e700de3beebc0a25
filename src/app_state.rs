//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::fraud::FraudEngine;
use crate::voucher::{Sweeper, VoucherService};
use crate::wallet::WalletService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub voucher_service: Arc<VoucherService>,
    pub wallet_service: Arc<WalletService>,
    pub fraud_engine: Arc<FraudEngine>,
    pub sweeper: Arc<Sweeper>,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        voucher_service: Arc<VoucherService>,
        wallet_service: Arc<WalletService>,
        fraud_engine: Arc<FraudEngine>,
        sweeper: Arc<Sweeper>,
    ) -> Self {
        Self {
            db_pool,
            voucher_service,
            wallet_service,
            fraud_engine,
            sweeper,
        }
    }
}

impl FromRef<AppState> for Arc<VoucherService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.voucher_service.clone()
    }
}

impl FromRef<AppState> for Arc<WalletService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_service.clone()
    }
}

impl FromRef<AppState> for Arc<FraudEngine> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.fraud_engine.clone()
    }
}
