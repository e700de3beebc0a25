//! Fraud Scoring Engine
//!
//! Computes a 0-100 risk score and a four-level classification for vouchers
//! and users from accumulated signals. Scores are recomputed from scratch on
//! every pass, never incremented, so re-analysis is idempotent. A Critical
//! verdict deactivates the voucher (or suspends the user) inside the same
//! call rather than deferring to the caller.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::fraud::config::FraudConfig;
use crate::fraud::model::{Assessment, DetectedSignal, FraudIncident, IncidentType, Severity};
use crate::models::{RiskLevel, User};
use crate::sinks::Sinks;
use crate::voucher::model::Voucher;

// ============================================================================
// Signal Inputs & Pure Evaluation
// ============================================================================

/// Everything the voucher scorer looks at, gathered up front so the scoring
/// itself stays pure.
#[derive(Debug, Clone, Default)]
pub struct VoucherSignalInputs {
    /// Code hash collides with another active voucher
    pub duplicate_active: bool,
    /// Code hash collides with an archived voucher
    pub duplicate_archive: bool,
    /// (original - listed) / original
    pub discount_fraction: Decimal,
    /// Voucher creations by the same owner in the trailing window
    pub recent_listings_by_owner: i64,
    /// Failed-authentication counter on this voucher
    pub failed_attempts: i32,
}

/// Inputs to the user scorer
#[derive(Debug, Clone, Default)]
pub struct UserSignalInputs {
    /// Vouchers owned by the user currently at High or Critical risk
    pub risky_vouchers: i64,
    /// Failed purchase transactions by the user
    pub failed_transactions: i64,
}

/// Score a voucher from its signal inputs. Pure; score clamped to [0, 100].
pub fn evaluate_voucher(inputs: &VoucherSignalInputs, config: &FraudConfig) -> Assessment {
    let mut signals = Vec::new();

    if inputs.duplicate_active {
        signals.push(DetectedSignal {
            incident_type: IncidentType::DuplicateCode,
            severity: Severity::Critical,
            weight: config.weight_duplicate_active,
            evidence: "Code hash matches another active listing".to_string(),
        });
    }

    if inputs.duplicate_archive {
        signals.push(DetectedSignal {
            incident_type: IncidentType::DuplicateCode,
            severity: Severity::High,
            weight: config.weight_duplicate_archive,
            evidence: "Code hash matches a previously archived voucher".to_string(),
        });
    }

    if inputs.discount_fraction > config.abnormal_discount_threshold {
        signals.push(DetectedSignal {
            incident_type: IncidentType::AbnormalDiscount,
            severity: Severity::Medium,
            weight: config.weight_abnormal_discount,
            evidence: format!(
                "Discount fraction {} exceeds {}",
                inputs.discount_fraction, config.abnormal_discount_threshold
            ),
        });
    }

    if inputs.recent_listings_by_owner > config.rapid_listing_limit {
        signals.push(DetectedSignal {
            incident_type: IncidentType::SuspiciousUpload,
            severity: Severity::Medium,
            weight: config.weight_rapid_listing,
            evidence: format!(
                "{} listings created in the last {} minutes",
                inputs.recent_listings_by_owner, config.rapid_listing_window_minutes
            ),
        });
    }

    if inputs.failed_attempts > config.failed_auth_signal_limit {
        signals.push(DetectedSignal {
            incident_type: IncidentType::FailedAuthLimit,
            severity: Severity::Low,
            weight: config.weight_failed_auth,
            evidence: format!(
                "{} failed authentication attempts recorded",
                inputs.failed_attempts
            ),
        });
    }

    let score: i32 = signals.iter().map(|s| s.weight).sum::<i32>().clamp(0, 100);
    let level = config.voucher_thresholds.classify(score);

    Assessment {
        score,
        level,
        signals,
    }
}

/// Score a user from their signal inputs. Pure; score clamped to [0, 100].
pub fn evaluate_user(inputs: &UserSignalInputs, config: &FraudConfig) -> Assessment {
    let mut signals = Vec::new();
    let mut score = 0i64;

    if inputs.risky_vouchers > 0 {
        let base = inputs.risky_vouchers * config.user_weight_per_risky_voucher as i64;
        let bonus = if inputs.risky_vouchers > config.user_risky_voucher_bulk_limit {
            config.user_risky_voucher_bulk_bonus as i64
        } else {
            0
        };
        score += base + bonus;
        signals.push(DetectedSignal {
            incident_type: IncidentType::Other,
            severity: if bonus > 0 {
                Severity::High
            } else {
                Severity::Medium
            },
            weight: (base + bonus).min(i32::MAX as i64) as i32,
            evidence: format!(
                "{} owned vouchers currently at high or critical risk",
                inputs.risky_vouchers
            ),
        });
    }

    if inputs.failed_transactions > config.user_failed_tx_limit {
        score += config.user_weight_failed_tx as i64;
        signals.push(DetectedSignal {
            incident_type: IncidentType::Other,
            severity: Severity::Medium,
            weight: config.user_weight_failed_tx,
            evidence: format!("{} failed transactions", inputs.failed_transactions),
        });
    }

    let score = score.clamp(0, 100) as i32;
    let level = config.user_thresholds.classify(score);

    Assessment {
        score,
        level,
        signals,
    }
}

// ============================================================================
// Fraud Engine Service
// ============================================================================

/// Fraud scoring engine service
#[derive(Clone)]
pub struct FraudEngine {
    db_pool: PgPool,
    config: FraudConfig,
    sinks: Sinks,
}

impl FraudEngine {
    pub fn new(db_pool: PgPool, config: FraudConfig, sinks: Sinks) -> Self {
        Self {
            db_pool,
            config,
            sinks,
        }
    }

    /// Full analysis pass over one voucher.
    ///
    /// Persists the recomputed score and level, logs an incident per
    /// triggered signal, and on a Critical verdict deactivates and rejects
    /// the voucher before returning.
    pub async fn analyze_voucher(&self, voucher_id: Uuid) -> ApiResult<Assessment> {
        let voucher = self.get_voucher(voucher_id).await?;

        let inputs = self.gather_voucher_inputs(&voucher).await?;
        let assessment = evaluate_voucher(&inputs, &self.config);

        sqlx::query(
            r#"
            UPDATE vouchers
            SET fraud_risk_score = $1, fraud_risk_level = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(assessment.score)
        .bind(assessment.level)
        .bind(voucher.id)
        .execute(&self.db_pool)
        .await?;

        // Every triggered signal is logged on every pass; repeated runs over
        // an unchanged voucher produce repeated incident rows.
        for signal in &assessment.signals {
            self.log_incident(
                signal.incident_type,
                signal.severity,
                &signal.evidence,
                voucher.owner_id,
                Some(voucher.id),
            )
            .await?;
        }

        if assessment.level == RiskLevel::Critical {
            self.force_reject_voucher(&voucher, assessment.score).await?;
        }

        tracing::info!(
            voucher_id = %voucher.id,
            score = assessment.score,
            level = ?assessment.level,
            signals = assessment.signals.len(),
            "Voucher fraud analysis completed"
        );

        Ok(assessment)
    }

    /// Full analysis pass over one user.
    ///
    /// Applies the trust-score penalty and, on the first transition into
    /// Critical, suspends the account. An already-suspended user is never
    /// re-suspended or re-logged.
    pub async fn analyze_user(&self, user_id: Uuid) -> ApiResult<Assessment> {
        let user = self.get_user(user_id).await?;

        let inputs = self.gather_user_inputs(user_id).await?;
        let assessment = evaluate_user(&inputs, &self.config);

        let penalty = self.config.trust_penalty(assessment.level);

        sqlx::query(
            r#"
            UPDATE users
            SET fraud_risk_score = $1,
                fraud_risk_level = $2,
                trust_score = GREATEST(trust_score - $3, 0),
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(assessment.score)
        .bind(assessment.level)
        .bind(penalty)
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;

        if assessment.level == RiskLevel::Critical && !user.is_suspended {
            self.suspend_user(&user, assessment.score).await?;
        }

        tracing::info!(
            user_id = %user_id,
            score = assessment.score,
            level = ?assessment.level,
            "User fraud analysis completed"
        );

        Ok(assessment)
    }

    /// Record a failed authentication attempt against a voucher.
    ///
    /// The increment is a single atomic update; once the counter passes the
    /// configured trigger, a full voucher analysis runs.
    pub async fn report_failed_attempt(&self, voucher_id: Uuid) -> ApiResult<i32> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE vouchers
            SET attempts = attempts + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING attempts
            "#,
        )
        .bind(voucher_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let (attempts,) =
            row.ok_or_else(|| ApiError::NotFound("Voucher not found".to_string()))?;

        if attempts > self.config.failed_auth_analysis_trigger {
            tracing::warn!(
                voucher_id = %voucher_id,
                attempts,
                "Failed-attempt threshold exceeded, running full analysis"
            );
            self.analyze_voucher(voucher_id).await?;
        }

        Ok(attempts)
    }

    /// Shared incident primitive.
    ///
    /// The incident row must be durably written; the audit entry and the
    /// low/medium-severity warning notification are best-effort and can
    /// never fail the caller.
    pub async fn log_incident(
        &self,
        incident_type: IncidentType,
        severity: Severity,
        evidence: &str,
        user_id: Uuid,
        voucher_id: Option<Uuid>,
    ) -> ApiResult<FraudIncident> {
        let incident = sqlx::query_as::<_, FraudIncident>(
            r#"
            INSERT INTO fraud_incidents (id, incident_type, severity, evidence, user_id, voucher_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(incident_type)
        .bind(severity)
        .bind(evidence)
        .bind(user_id)
        .bind(voucher_id)
        .fetch_one(&self.db_pool)
        .await?;

        self.sinks
            .audit_best_effort(
                "fraud-engine",
                "incident_logged",
                voucher_id.or(Some(user_id)),
                evidence,
            )
            .await;

        if severity.warns_user() {
            self.sinks
                .notify_best_effort(
                    user_id,
                    "Listing flagged for review",
                    "One of your listings triggered an automated fraud check. \
                     Please review your recent activity.",
                )
                .await;
        }

        Ok(incident)
    }

    /// List recent incidents, newest first.
    pub async fn recent_incidents(&self, limit: i64) -> ApiResult<Vec<FraudIncident>> {
        let incidents = sqlx::query_as::<_, FraudIncident>(
            "SELECT * FROM fraud_incidents ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(incidents)
    }

    // ========================================================================
    // Private Helper Methods
    // ========================================================================

    async fn get_voucher(&self, voucher_id: Uuid) -> ApiResult<Voucher> {
        sqlx::query_as::<_, Voucher>("SELECT * FROM vouchers WHERE id = $1")
            .bind(voucher_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("Voucher not found".to_string()))
    }

    async fn get_user(&self, user_id: Uuid) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    async fn gather_voucher_inputs(&self, voucher: &Voucher) -> ApiResult<VoucherSignalInputs> {
        let duplicate_active: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM vouchers
            WHERE scratch_code_hash = $1 AND is_active = TRUE AND id != $2
            LIMIT 1
            "#,
        )
        .bind(&voucher.scratch_code_hash)
        .bind(voucher.id)
        .fetch_optional(&self.db_pool)
        .await?;

        let duplicate_archive: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM voucher_archives WHERE scratch_code_hash = $1 LIMIT 1",
        )
        .bind(&voucher.scratch_code_hash)
        .fetch_optional(&self.db_pool)
        .await?;

        let window_start =
            Utc::now() - Duration::minutes(self.config.rapid_listing_window_minutes);
        let (recent_listings,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM vouchers WHERE owner_id = $1 AND created_at > $2",
        )
        .bind(voucher.owner_id)
        .bind(window_start)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(VoucherSignalInputs {
            duplicate_active: duplicate_active.is_some(),
            duplicate_archive: duplicate_archive.is_some(),
            discount_fraction: voucher.discount_percent,
            recent_listings_by_owner: recent_listings,
            failed_attempts: voucher.attempts,
        })
    }

    async fn gather_user_inputs(&self, user_id: Uuid) -> ApiResult<UserSignalInputs> {
        let (risky_vouchers,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM vouchers
            WHERE owner_id = $1 AND fraud_risk_level IN ('high', 'critical')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        let (failed_transactions,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE buyer_id = $1 AND status = 'failed'",
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(UserSignalInputs {
            risky_vouchers,
            failed_transactions,
        })
    }

    async fn force_reject_voucher(&self, voucher: &Voucher, score: i32) -> ApiResult<()> {
        sqlx::query(
            r#"
            UPDATE vouchers
            SET status = 'rejected',
                verification_status = 'rejected',
                is_active = FALSE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(voucher.id)
        .execute(&self.db_pool)
        .await?;

        tracing::warn!(
            voucher_id = %voucher.id,
            owner_id = %voucher.owner_id,
            score,
            "Voucher deactivated: critical fraud risk"
        );

        self.sinks
            .audit_best_effort(
                "fraud-engine",
                "voucher_force_rejected",
                Some(voucher.id),
                &format!("Critical fraud score {}", score),
            )
            .await;

        Ok(())
    }

    async fn suspend_user(&self, user: &User, score: i32) -> ApiResult<()> {
        let reason = format!(
            "Automatic suspension: fraud risk score {} reached critical threshold",
            score
        );

        sqlx::query(
            r#"
            UPDATE users
            SET is_suspended = TRUE, suspension_reason = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(&reason)
        .bind(user.id)
        .execute(&self.db_pool)
        .await?;

        tracing::warn!(user_id = %user.id, score, "User suspended: critical fraud risk");

        self.sinks
            .audit_best_effort("fraud-engine", "user_suspended", Some(user.id), &reason)
            .await;

        self.log_incident(
            IncidentType::Other,
            Severity::Critical,
            &reason,
            user.id,
            None,
        )
        .await?;

        Ok(())
    }
}
