//! Background sweeps over the voucher table.
//!
//! Two periodic jobs: the expiry sweep archives vouchers past their expiry
//! date, and the fraud sweep re-runs analysis over the active inventory.
//! Both are safe to run concurrently with live traffic and with themselves.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::Order;
use crate::sinks::Sinks;
use crate::voucher::model::{SweepReport, Voucher};
use crate::voucher::service::VoucherService;

/// Driver for the periodic expiry and fraud sweeps
#[derive(Clone)]
pub struct Sweeper {
    db_pool: PgPool,
    voucher_service: VoucherService,
    sinks: Sinks,
}

impl Sweeper {
    pub fn new(db_pool: PgPool, voucher_service: VoucherService, sinks: Sinks) -> Self {
        Self {
            db_pool,
            voucher_service,
            sinks,
        }
    }

    /// Archive every voucher past its expiry date.
    ///
    /// A voucher with an in-flight order is skipped this pass and picked up
    /// again once the order settles. A voucher holding a processing lock is
    /// mid-purchase (the gate cleared but no order row exists yet), so it is
    /// never selected; the lock release or the eventual order settling lets
    /// a later pass take it. For each expired voucher the archive snapshot
    /// and the status stamp commit in one transaction, then the owner is
    /// notified best-effort.
    pub async fn run_expiry_sweep(&self) -> ApiResult<SweepReport> {
        let due = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT * FROM vouchers
            WHERE expiry_date < NOW()
              AND status NOT IN ('expired', 'rejected')
              AND is_locked = FALSE
            ORDER BY expiry_date ASC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        let mut report = SweepReport::default();

        for voucher in due {
            if self.has_in_flight_order(voucher.id).await? {
                tracing::debug!(
                    voucher_id = %voucher.id,
                    "Expiry sweep skipping voucher with in-flight order"
                );
                report.skipped_in_flight += 1;
                continue;
            }

            match self.archive_voucher(&voucher).await {
                Ok(()) => {
                    self.sinks
                        .notify_best_effort(
                            voucher.owner_id,
                            "Voucher expired",
                            &format!(
                                "Your {} voucher has expired and was removed from the marketplace",
                                voucher.brand
                            ),
                        )
                        .await;
                    report.archived += 1;
                }
                Err(e) => {
                    // One bad row must not abort the whole pass.
                    tracing::error!(
                        voucher_id = %voucher.id,
                        error = %e,
                        "Failed to archive expired voucher"
                    );
                }
            }
        }

        tracing::info!(
            archived = report.archived,
            skipped_in_flight = report.skipped_in_flight,
            "Expiry sweep complete"
        );

        Ok(report)
    }

    /// Re-run fraud analysis over every active pending or published voucher.
    ///
    /// Scores are recomputed from scratch each pass, so repeating the sweep
    /// over unchanged data reaches the same verdicts.
    pub async fn run_fraud_sweep(&self) -> ApiResult<u32> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM vouchers
            WHERE status IN ('pending', 'published')
              AND is_active = TRUE
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        let mut analyzed = 0u32;
        for (voucher_id,) in ids {
            match self.voucher_service.verify_and_analyze(voucher_id).await {
                Ok(_) => analyzed += 1,
                Err(e) => {
                    tracing::error!(
                        voucher_id = %voucher_id,
                        error = %e,
                        "Fraud sweep analysis failed for voucher"
                    );
                }
            }
        }

        tracing::info!(analyzed = analyzed, "Fraud sweep complete");

        Ok(analyzed)
    }

    async fn has_in_flight_order(&self, voucher_id: Uuid) -> ApiResult<bool> {
        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE voucher_id = $1")
            .bind(voucher_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(orders.iter().any(|o| o.status.is_in_flight()))
    }

    async fn archive_voucher(&self, voucher: &Voucher) -> ApiResult<()> {
        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO voucher_archives (
                id, voucher_id, owner_id, brand, category,
                original_price, listed_price, scratch_code_hash,
                final_status, expiry_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'expired', $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(voucher.id)
        .bind(voucher.owner_id)
        .bind(&voucher.brand)
        .bind(&voucher.category)
        .bind(voucher.original_price)
        .bind(voucher.listed_price)
        .bind(&voucher.scratch_code_hash)
        .bind(voucher.expiry_date)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE vouchers
            SET status = 'expired',
                is_active = FALSE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(voucher.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(voucher_id = %voucher.id, "Voucher archived as expired");

        Ok(())
    }
}
