//! Shared data models for the Vouchex backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Four-level risk classification, derived from a 0-100 score via
/// fixed thresholds. Shared by vouchers and users.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(type_name = "risk_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Levels at which a voucher is withheld from purchase.
    pub fn blocks_purchase(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

/// User model (the fields the core acts on; auth lives elsewhere)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub trust_score: i32,
    pub fraud_risk_score: i32,
    pub fraud_risk_level: RiskLevel,
    pub is_suspended: bool,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase order status
///
/// `AwaitingPayment` and `PendingAdminConfirmation` are the in-flight states
/// that shield a voucher from the expiry sweep.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    PendingAdminConfirmation,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            OrderStatus::AwaitingPayment | OrderStatus::PendingAdminConfirmation
        )
    }
}

/// Purchase order for a voucher, settled manually by an administrator
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Order {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub buyer_id: Uuid,
    pub amount: rust_decimal::Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_purchase_block() {
        assert!(!RiskLevel::Low.blocks_purchase());
        assert!(!RiskLevel::Medium.blocks_purchase());
        assert!(RiskLevel::High.blocks_purchase());
        assert!(RiskLevel::Critical.blocks_purchase());
    }

    #[test]
    fn test_order_status_in_flight() {
        assert!(OrderStatus::AwaitingPayment.is_in_flight());
        assert!(OrderStatus::PendingAdminConfirmation.is_in_flight());
        assert!(!OrderStatus::Completed.is_in_flight());
        assert!(!OrderStatus::Failed.is_in_flight());
        assert!(!OrderStatus::Cancelled.is_in_flight());
    }
}
