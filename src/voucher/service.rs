//! Voucher service layer - lifecycle state machine and purchase gate
//!
//! Owns the voucher's status field and the purchase-time locking protocol.
//! The lock acquisition is a single conditional UPDATE evaluated by Postgres,
//! never a read followed by a write, so concurrent purchase attempts on the
//! same voucher serialize without a race window.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto;
use crate::error::{ApiError, ApiResult};
use crate::fraud::{Assessment, FraudEngine};
use crate::models::RiskLevel;
use crate::sinks::Sinks;
use crate::voucher::code_validator::{self, DuplicateLocation};
use crate::voucher::model::{
    CreateVoucherRequest, GateOutcome, GateRejection, ListVouchersQuery, UpdateVoucherRequest,
    Voucher, VoucherStatus,
};

/// Derived discount fraction: (original - listed) / original, 0 when the
/// original price is not positive.
pub fn compute_discount_percent(original: Decimal, listed: Decimal) -> Decimal {
    if original <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((original - listed) / original).round_dp(4)
}

/// Derived seller payout: listed price minus the platform fee.
pub fn compute_seller_payout(listed: Decimal, platform_fee_percent: Decimal) -> Decimal {
    (listed * (Decimal::ONE - platform_fee_percent)).round_dp(2)
}

/// Voucher service for lifecycle management and the purchase gate
#[derive(Clone)]
pub struct VoucherService {
    db_pool: PgPool,
    platform_fee_percent: Decimal,
    encryption_key: [u8; 32],
    fraud_engine: FraudEngine,
    sinks: Sinks,
}

impl VoucherService {
    pub fn new(
        db_pool: PgPool,
        platform_fee_percent: Decimal,
        encryption_key: [u8; 32],
        fraud_engine: FraudEngine,
        sinks: Sinks,
    ) -> Self {
        Self {
            db_pool,
            platform_fee_percent,
            encryption_key,
            fraud_engine,
            sinks,
        }
    }

    /// List a new voucher.
    ///
    /// Runs the full code-validation chain, derives the pricing fields,
    /// stores only the encrypted code plus its hash, and runs a fraud
    /// analysis on the voucher and its owner before returning. A requested
    /// `published` status is demoted to `pending` until admin approval.
    pub async fn create_voucher(&self, request: CreateVoucherRequest) -> ApiResult<Voucher> {
        let code = request
            .scratch_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::ValidationError("A voucher code is required".to_string()))?;

        self.run_code_checks(&request.brand, code, None).await?;

        let discount_percent =
            compute_discount_percent(request.original_price, request.listed_price);
        let seller_payout =
            compute_seller_payout(request.listed_price, self.platform_fee_percent);

        let status = match request.status.unwrap_or(VoucherStatus::Draft) {
            // Publication requires admin approval; park it in review.
            VoucherStatus::Published => VoucherStatus::Pending,
            other => other,
        };

        let scratch_code_enc = crypto::encrypt_code(&self.encryption_key, code)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let scratch_code_hash = crypto::hash_code(&code_validator::normalize_code(code));

        let voucher = sqlx::query_as::<_, Voucher>(
            r#"
            INSERT INTO vouchers (
                id, owner_id, brand, category, original_price, listed_price,
                discount_percent, seller_payout, quantity, status,
                verification_status, is_approved, scratch_code_enc,
                scratch_code_hash, expiry_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', FALSE, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.owner_id)
        .bind(&request.brand)
        .bind(&request.category)
        .bind(request.original_price)
        .bind(request.listed_price)
        .bind(discount_percent)
        .bind(seller_payout)
        .bind(request.quantity)
        .bind(status)
        .bind(&scratch_code_enc)
        .bind(&scratch_code_hash)
        .bind(request.expiry_date)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(voucher_id = %voucher.id, owner_id = %voucher.owner_id, "Voucher created");

        // Analysis completes before the voucher can become purchasable.
        self.fraud_engine.analyze_voucher(voucher.id).await?;
        self.fraud_engine.analyze_user(voucher.owner_id).await?;

        // Reload: the analysis may have rejected the voucher outright.
        self.get_voucher(voucher.id).await
    }

    /// Update an existing voucher.
    ///
    /// A changed code re-runs the full validation chain (excluding this
    /// voucher from the duplicate search); a changed price recomputes both
    /// derived fields from the persisted record merged with the new values.
    pub async fn update_voucher(
        &self,
        voucher_id: Uuid,
        request: UpdateVoucherRequest,
    ) -> ApiResult<Voucher> {
        let existing = self.get_voucher(voucher_id).await?;

        let brand = request.brand.as_deref().unwrap_or(&existing.brand);

        let (scratch_code_enc, scratch_code_hash) = match request.scratch_code.as_deref() {
            Some(code) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(ApiError::ValidationError(
                        "A voucher code cannot be blank".to_string(),
                    ));
                }
                self.run_code_checks(brand, code, Some(voucher_id)).await?;
                let enc = crypto::encrypt_code(&self.encryption_key, code)
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;
                let hash = crypto::hash_code(&code_validator::normalize_code(code));
                (enc, hash)
            }
            None => (
                existing.scratch_code_enc.clone(),
                existing.scratch_code_hash.clone(),
            ),
        };

        let original_price = request.original_price.unwrap_or(existing.original_price);
        let listed_price = request.listed_price.unwrap_or(existing.listed_price);
        let discount_percent = compute_discount_percent(original_price, listed_price);
        let seller_payout = compute_seller_payout(listed_price, self.platform_fee_percent);

        let voucher = sqlx::query_as::<_, Voucher>(
            r#"
            UPDATE vouchers
            SET brand = $1,
                category = $2,
                original_price = $3,
                listed_price = $4,
                discount_percent = $5,
                seller_payout = $6,
                quantity = $7,
                scratch_code_enc = $8,
                scratch_code_hash = $9,
                expiry_date = $10,
                updated_at = NOW()
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(brand)
        .bind(request.category.as_deref().unwrap_or(&existing.category))
        .bind(original_price)
        .bind(listed_price)
        .bind(discount_percent)
        .bind(seller_payout)
        .bind(request.quantity.unwrap_or(existing.quantity))
        .bind(&scratch_code_enc)
        .bind(&scratch_code_hash)
        .bind(request.expiry_date.unwrap_or(existing.expiry_date))
        .bind(voucher_id)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(voucher_id = %voucher.id, "Voucher updated");

        Ok(voucher)
    }

    /// Get a single voucher by ID
    pub async fn get_voucher(&self, voucher_id: Uuid) -> ApiResult<Voucher> {
        sqlx::query_as::<_, Voucher>("SELECT * FROM vouchers WHERE id = $1")
            .bind(voucher_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("Voucher not found".to_string()))
    }

    /// List vouchers with filtering and pagination
    pub async fn list_vouchers(&self, query: ListVouchersQuery) -> ApiResult<Vec<Voucher>> {
        let page = query.page.unwrap_or(1).max(1) as i64;
        let limit = query.limit.unwrap_or(20).clamp(1, 100) as i64;
        let offset = (page - 1) * limit;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM vouchers WHERE 1=1");

        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
        if let Some(owner_id) = query.owner_id {
            query_builder.push(" AND owner_id = ");
            query_builder.push_bind(owner_id);
        }
        if let Some(brand) = query.brand {
            query_builder.push(" AND brand = ");
            query_builder.push_bind(brand);
        }

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let vouchers = query_builder
            .build_query_as::<Voucher>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(vouchers)
    }

    /// Purchase gate: atomically lock the voucher, then validate it for the
    /// acting buyer.
    ///
    /// On `Cleared` the lock is still held and releasing it is the purchase
    /// flow's responsibility. On `Rejected` the lock has been released; the
    /// attached voucher is context only. Any unexpected error after the lock
    /// was acquired releases it before propagating.
    pub async fn validate_for_usage(
        &self,
        voucher_id: Uuid,
        buyer_id: Uuid,
    ) -> ApiResult<GateOutcome> {
        // Single atomic conditional write: only an unlocked, published,
        // active voucher can transition to locked.
        let locked = sqlx::query_as::<_, Voucher>(
            r#"
            UPDATE vouchers
            SET is_locked = TRUE, updated_at = NOW()
            WHERE id = $1
              AND is_locked = FALSE
              AND status = 'published'
              AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(voucher_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(voucher) = locked else {
            return self.diagnose_gate_miss(voucher_id).await;
        };

        match self.run_purchase_checks(&voucher, buyer_id).await {
            Ok(None) => {
                tracing::info!(
                    voucher_id = %voucher.id,
                    buyer_id = %buyer_id,
                    "Purchase gate cleared, lock held"
                );
                Ok(GateOutcome::Cleared { voucher })
            }
            Ok(Some(rejection)) => {
                self.unlock_voucher(voucher_id).await?;
                tracing::info!(
                    voucher_id = %voucher.id,
                    buyer_id = %buyer_id,
                    reason = ?rejection,
                    "Purchase gate rejected"
                );
                Ok(GateOutcome::rejected(rejection, Some(voucher)))
            }
            Err(e) => {
                // Never leave an orphaned lock behind an error.
                if let Err(unlock_err) = self.unlock_voucher(voucher_id).await {
                    tracing::error!(
                        voucher_id = %voucher_id,
                        error = %unlock_err,
                        "Failed to release lock while handling gate error"
                    );
                }
                Err(e)
            }
        }
    }

    /// Manual lock release; the recovery path for stuck locks. Idempotent.
    pub async fn unlock_voucher(&self, voucher_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE vouchers SET is_locked = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(voucher_id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Voucher not found".to_string()));
        }

        Ok(())
    }

    /// Re-run fraud analysis on the voucher and its owner; a Critical verdict
    /// on either side forces the voucher into a rejected, inactive state.
    ///
    /// Used at creation time and by the periodic fraud sweep.
    pub async fn verify_and_analyze(
        &self,
        voucher_id: Uuid,
    ) -> ApiResult<(Assessment, Assessment)> {
        let voucher = self.get_voucher(voucher_id).await?;

        let voucher_assessment = self.fraud_engine.analyze_voucher(voucher_id).await?;
        let owner_assessment = self.fraud_engine.analyze_user(voucher.owner_id).await?;

        if voucher_assessment.level == RiskLevel::Critical
            || owner_assessment.level == RiskLevel::Critical
        {
            // analyze_voucher already rejects on its own Critical verdict;
            // this also covers the owner-critical case, regardless of any
            // other in-flight state.
            sqlx::query(
                r#"
                UPDATE vouchers
                SET verification_status = 'rejected',
                    status = 'rejected',
                    is_active = FALSE,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(voucher_id)
            .execute(&self.db_pool)
            .await?;

            self.sinks
                .audit_best_effort(
                    "voucher-service",
                    "verification_rejected",
                    Some(voucher_id),
                    "Critical fraud assessment during verification",
                )
                .await;
        }

        Ok((voucher_assessment, owner_assessment))
    }

    // ===== Private Helper Methods =====

    /// Dummy check, duplicate check, format check; in that order, first
    /// failure wins. Messages never echo the submitted code.
    async fn run_code_checks(
        &self,
        brand: &str,
        code: &str,
        exclude: Option<Uuid>,
    ) -> ApiResult<()> {
        if code_validator::is_dummy_code(code) {
            return Err(ApiError::ValidationError(
                "Security alert: the supplied code looks like a placeholder and was rejected"
                    .to_string(),
            ));
        }

        let duplicates = code_validator::check_duplicates(&self.db_pool, code, exclude)
            .await
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

        if duplicates.is_duplicate {
            let message = match duplicates.location {
                Some(DuplicateLocation::Active) => {
                    "This code is already listed on an active voucher"
                }
                Some(DuplicateLocation::Archive) => {
                    "This code was previously used and cannot be relisted"
                }
                None => "This code is a duplicate",
            };
            return Err(ApiError::ValidationError(message.to_string()));
        }

        if !code_validator::validate_format(brand, code) {
            return Err(ApiError::ValidationError(format!(
                "Code does not match the expected format for {}",
                brand
            )));
        }

        Ok(())
    }

    /// Read-only lookup producing an accurate rejection after the atomic
    /// lock attempt matched nothing. Must not acquire or release the lock.
    async fn diagnose_gate_miss(&self, voucher_id: Uuid) -> ApiResult<GateOutcome> {
        let voucher = sqlx::query_as::<_, Voucher>("SELECT * FROM vouchers WHERE id = $1")
            .bind(voucher_id)
            .fetch_optional(&self.db_pool)
            .await?;

        let rejection = match &voucher {
            None => GateRejection::NotFound,
            Some(v) if v.is_locked => GateRejection::BeingProcessed,
            Some(v) if v.status != VoucherStatus::Published => {
                GateRejection::WrongStatus(v.status)
            }
            Some(_) => GateRejection::NotAvailable,
        };

        Ok(GateOutcome::rejected(rejection, None))
    }

    /// Ordered validation run while the lock is held. Returns the first
    /// failing check, applying the documented status side effects as it goes;
    /// `None` means the purchase may proceed.
    async fn run_purchase_checks(
        &self,
        voucher: &Voucher,
        buyer_id: Uuid,
    ) -> ApiResult<Option<GateRejection>> {
        // Expired vouchers are stamped even on a failed purchase attempt.
        if voucher.is_expired_at(chrono::Utc::now()) {
            self.stamp_status(voucher.id, VoucherStatus::Expired).await?;
            return Ok(Some(GateRejection::Expired));
        }

        if voucher.owner_id == buyer_id {
            return Ok(Some(GateRejection::SelfPurchase));
        }

        let (seller_suspended,): (bool,) =
            sqlx::query_as("SELECT is_suspended FROM users WHERE id = $1")
                .bind(voucher.owner_id)
                .fetch_one(&self.db_pool)
                .await?;
        if seller_suspended {
            return Ok(Some(GateRejection::SellerSuspended));
        }

        if voucher.quantity <= 0 {
            self.stamp_status(voucher.id, VoucherStatus::SoldOut).await?;
            return Ok(Some(GateRejection::SoldOut));
        }

        if voucher.fraud_risk_level.blocks_purchase() {
            return Ok(Some(GateRejection::RiskHold));
        }

        Ok(None)
    }

    async fn stamp_status(&self, voucher_id: Uuid, status: VoucherStatus) -> ApiResult<()> {
        let deactivate = matches!(status, VoucherStatus::Expired);

        sqlx::query(
            r#"
            UPDATE vouchers
            SET status = $1,
                is_active = CASE WHEN $2 THEN FALSE ELSE is_active END,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status)
        .bind(deactivate)
        .bind(voucher_id)
        .execute(&self.db_pool)
        .await?;

        tracing::info!(voucher_id = %voucher_id, status = status.as_str(), "Voucher status stamped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_discount_percent() {
        assert_eq!(compute_discount_percent(dec!(100), dec!(4)), dec!(0.96));
        assert_eq!(compute_discount_percent(dec!(100), dec!(75)), dec!(0.25));
        assert_eq!(compute_discount_percent(dec!(50), dec!(50)), dec!(0));
    }

    #[test]
    fn test_discount_percent_zero_original() {
        assert_eq!(compute_discount_percent(dec!(0), dec!(10)), dec!(0));
        assert_eq!(compute_discount_percent(dec!(-5), dec!(10)), dec!(0));
    }

    #[test]
    fn test_seller_payout() {
        assert_eq!(compute_seller_payout(dec!(100), dec!(0.10)), dec!(90.00));
        assert_eq!(compute_seller_payout(dec!(19.99), dec!(0.10)), dec!(17.99));
        assert_eq!(compute_seller_payout(dec!(50), dec!(0)), dec!(50.00));
    }
}
