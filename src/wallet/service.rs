//! Wallet service layer - balance management backed by an append-only ledger
//!
//! Every balance change happens inside a transaction that row-locks the
//! wallet, re-checks funds, updates the balance, and appends the matching
//! ledger entry. The ledger sum always reconciles to the balance column.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::wallet::model::{LedgerEntryKind, Wallet, WalletTransaction};

/// Wallet service for balance and ledger operations
#[derive(Clone)]
pub struct WalletService {
    db_pool: PgPool,
}

impl WalletService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Get a user's wallet, creating an empty one on first touch.
    pub async fn get_or_create_wallet(&self, user_id: Uuid) -> ApiResult<Wallet> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (id, user_id, balance)
            VALUES ($1, $2, 0)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = wallets.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(wallet)
    }

    /// Post a credit or debit against a user's wallet.
    ///
    /// The wallet row is locked for the duration of the transaction. A debit
    /// exceeding the available balance is rejected outright: no balance
    /// change, no ledger entry.
    pub async fn add_transaction(
        &self,
        user_id: Uuid,
        kind: LedgerEntryKind,
        amount: Decimal,
        reference: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(ApiError::ValidationError(
                "Transaction amount must be positive".to_string(),
            ));
        }

        // Ensure the wallet row exists before trying to lock it.
        self.get_or_create_wallet(user_id).await?;

        let mut tx = self.db_pool.begin().await?;

        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let new_balance = match kind {
            LedgerEntryKind::Credit => wallet.balance + amount,
            LedgerEntryKind::Debit => {
                if amount > wallet.balance {
                    // Roll back the lock without touching anything.
                    tx.rollback().await?;
                    return Err(ApiError::UnprocessableEntity(
                        "Insufficient funds".to_string(),
                    ));
                }
                wallet.balance - amount
            }
        };

        sqlx::query("UPDATE wallets SET balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_balance)
            .bind(wallet.id)
            .execute(&mut *tx)
            .await?;

        let entry = sqlx::query_as::<_, WalletTransaction>(
            r#"
            INSERT INTO wallet_transactions (
                id, wallet_id, kind, amount, balance_after, reference, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wallet.id)
        .bind(kind)
        .bind(amount)
        .bind(new_balance)
        .bind(reference)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            wallet_id = %wallet.id,
            user_id = %user_id,
            kind = ?kind,
            amount = %amount,
            balance_after = %new_balance,
            "Ledger entry posted"
        );

        Ok(entry)
    }

    /// Newest-first transaction history, bounded.
    pub async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> ApiResult<Vec<WalletTransaction>> {
        let limit = limit.clamp(1, 200);

        let entries = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT wt.* FROM wallet_transactions wt
            JOIN wallets w ON w.id = wt.wallet_id
            WHERE w.user_id = $1
            ORDER BY wt.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(entries)
    }
}
