//! Wallet and ledger data models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Direction of a ledger entry
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "ledger_entry_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryKind {
    Credit,
    Debit,
}

/// Per-user wallet. The balance column is the single source of truth and is
/// only ever changed together with a matching ledger entry.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only ledger entry. `balance_after` snapshots the wallet balance
/// as of this entry's commit.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to post a ledger entry against a user's wallet
#[derive(Debug, Deserialize, Validate)]
pub struct AddTransactionRequest {
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    #[validate(length(max = 128))]
    pub reference: Option<String>,
    #[validate(length(max = 512))]
    pub description: Option<String>,
}

/// Query parameters for the transaction history endpoint
#[derive(Debug, Deserialize, Default)]
pub struct TransactionHistoryQuery {
    pub limit: Option<u32>,
}

/// Wallet balance plus its recent history
#[derive(Debug, Serialize)]
pub struct WalletSummary {
    pub wallet: Wallet,
    pub recent_transactions: Vec<WalletTransaction>,
}
