//! Scoring weights and thresholds for the fraud engine.
//!
//! The whole table is an explicit value passed into the engine so the
//! scoring functions stay pure and independently testable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::RiskLevel;

/// Score thresholds mapping a numeric score onto a risk level
#[derive(Debug, Clone, Copy)]
pub struct RiskThresholds {
    pub critical: i32,
    pub high: i32,
    pub medium: i32,
}

impl RiskThresholds {
    pub fn classify(&self, score: i32) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Per-signal weights and decision thresholds
#[derive(Debug, Clone)]
pub struct FraudConfig {
    /// Code hash matches another active voucher
    pub weight_duplicate_active: i32,
    /// Code hash matches an archived voucher
    pub weight_duplicate_archive: i32,
    /// Discount fraction above `abnormal_discount_threshold`
    pub weight_abnormal_discount: i32,
    /// More than `rapid_listing_limit` uploads in the trailing hour
    pub weight_rapid_listing: i32,
    /// More than `failed_auth_signal_limit` failed attempts on the voucher
    pub weight_failed_auth: i32,

    pub abnormal_discount_threshold: Decimal,
    pub rapid_listing_limit: i64,
    pub rapid_listing_window_minutes: i64,
    pub failed_auth_signal_limit: i32,
    /// Attempt count beyond which `report_failed_attempt` escalates to a
    /// full voucher analysis
    pub failed_auth_analysis_trigger: i32,

    pub voucher_thresholds: RiskThresholds,
    pub user_thresholds: RiskThresholds,

    /// Per risky (high/critical) voucher owned by the user
    pub user_weight_per_risky_voucher: i32,
    /// Flat bonus once the risky-voucher count exceeds this
    pub user_risky_voucher_bulk_limit: i64,
    pub user_risky_voucher_bulk_bonus: i32,
    pub user_failed_tx_limit: i64,
    pub user_weight_failed_tx: i32,

    /// Trust-score penalties per resulting level, floored at 0
    pub trust_penalty_critical: i32,
    pub trust_penalty_high: i32,
    pub trust_penalty_medium: i32,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            weight_duplicate_active: 80,
            weight_duplicate_archive: 50,
            weight_abnormal_discount: 40,
            weight_rapid_listing: 30,
            weight_failed_auth: 20,

            abnormal_discount_threshold: dec!(0.95),
            rapid_listing_limit: 10,
            rapid_listing_window_minutes: 60,
            failed_auth_signal_limit: 5,
            failed_auth_analysis_trigger: 10,

            voucher_thresholds: RiskThresholds {
                critical: 80,
                high: 50,
                medium: 20,
            },
            user_thresholds: RiskThresholds {
                critical: 100,
                high: 60,
                medium: 30,
            },

            user_weight_per_risky_voucher: 20,
            user_risky_voucher_bulk_limit: 5,
            user_risky_voucher_bulk_bonus: 50,
            user_failed_tx_limit: 5,
            user_weight_failed_tx: 30,

            trust_penalty_critical: 50,
            trust_penalty_high: 20,
            trust_penalty_medium: 10,
        }
    }
}

impl FraudConfig {
    pub fn trust_penalty(&self, level: RiskLevel) -> i32 {
        match level {
            RiskLevel::Critical => self.trust_penalty_critical,
            RiskLevel::High => self.trust_penalty_high,
            RiskLevel::Medium => self.trust_penalty_medium,
            RiskLevel::Low => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voucher_thresholds() {
        let cfg = FraudConfig::default();
        assert_eq!(cfg.voucher_thresholds.classify(0), RiskLevel::Low);
        assert_eq!(cfg.voucher_thresholds.classify(19), RiskLevel::Low);
        assert_eq!(cfg.voucher_thresholds.classify(20), RiskLevel::Medium);
        assert_eq!(cfg.voucher_thresholds.classify(49), RiskLevel::Medium);
        assert_eq!(cfg.voucher_thresholds.classify(50), RiskLevel::High);
        assert_eq!(cfg.voucher_thresholds.classify(79), RiskLevel::High);
        assert_eq!(cfg.voucher_thresholds.classify(80), RiskLevel::Critical);
        assert_eq!(cfg.voucher_thresholds.classify(100), RiskLevel::Critical);
    }

    #[test]
    fn test_user_thresholds() {
        let cfg = FraudConfig::default();
        assert_eq!(cfg.user_thresholds.classify(29), RiskLevel::Low);
        assert_eq!(cfg.user_thresholds.classify(30), RiskLevel::Medium);
        assert_eq!(cfg.user_thresholds.classify(60), RiskLevel::High);
        assert_eq!(cfg.user_thresholds.classify(99), RiskLevel::High);
        assert_eq!(cfg.user_thresholds.classify(100), RiskLevel::Critical);
    }

    #[test]
    fn test_trust_penalties() {
        let cfg = FraudConfig::default();
        assert_eq!(cfg.trust_penalty(RiskLevel::Critical), 50);
        assert_eq!(cfg.trust_penalty(RiskLevel::High), 20);
        assert_eq!(cfg.trust_penalty(RiskLevel::Medium), 10);
        assert_eq!(cfg.trust_penalty(RiskLevel::Low), 0);
    }
}
