//! Voucher data models and request/response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::RiskLevel;

/// Voucher lifecycle status
///
/// `draft -> pending -> published -> {sold_out | expired | rejected}`.
/// The terminal-ish states never transition back to `published` without
/// fresh admin action.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "voucher_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    Draft,
    Pending,
    Published,
    Rejected,
    Expired,
    SoldOut,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherStatus::Draft => "draft",
            VoucherStatus::Pending => "pending",
            VoucherStatus::Published => "published",
            VoucherStatus::Rejected => "rejected",
            VoucherStatus::Expired => "expired",
            VoucherStatus::SoldOut => "sold_out",
        }
    }
}

/// Admin verification state. `Verified` is only ever set by admin approval.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "verification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Rejected,
    Verified,
}

/// Voucher model. The scratch code is stored encrypted plus hashed; the
/// plaintext never appears here.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Voucher {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub brand: String,
    pub category: String,
    pub original_price: Decimal,
    pub listed_price: Decimal,
    pub discount_percent: Decimal,
    pub seller_payout: Decimal,
    pub quantity: i32,
    pub status: VoucherStatus,
    pub is_active: bool,
    pub is_approved: bool,
    pub verification_status: VerificationStatus,
    pub is_locked: bool,
    #[serde(skip_serializing)]
    pub scratch_code_enc: String,
    pub scratch_code_hash: String,
    pub attempts: i32,
    pub fraud_risk_score: i32,
    pub fraud_risk_level: RiskLevel,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Voucher {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }
}

/// Write-once snapshot of an expired voucher. Its `scratch_code_hash`
/// permanently blocks re-listing of the same code.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct VoucherArchive {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub owner_id: Uuid,
    pub brand: String,
    pub category: String,
    pub original_price: Decimal,
    pub listed_price: Decimal,
    pub scratch_code_hash: String,
    pub final_status: VoucherStatus,
    pub expiry_date: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}

/// Request to list a voucher
#[derive(Debug, Deserialize, Validate)]
pub struct CreateVoucherRequest {
    pub owner_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub brand: String,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    pub original_price: Decimal,
    pub listed_price: Decimal,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Plaintext scratch code; encrypted before it touches storage.
    pub scratch_code: Option<String>,
    /// Requested initial status; `published` is demoted to `pending` until
    /// admin approval.
    pub status: Option<VoucherStatus>,
    pub expiry_date: DateTime<Utc>,
}

/// Partial update to an existing voucher
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVoucherRequest {
    #[validate(length(min = 1, max = 64))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub category: Option<String>,
    pub original_price: Option<Decimal>,
    pub listed_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub scratch_code: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Filtered voucher listing
#[derive(Debug, Deserialize, Default)]
pub struct ListVouchersQuery {
    pub status: Option<VoucherStatus>,
    pub owner_id: Option<Uuid>,
    pub brand: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Reason a purchase attempt was turned away at the gate
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateRejection {
    NotFound,
    BeingProcessed,
    WrongStatus(VoucherStatus),
    NotAvailable,
    Expired,
    SelfPurchase,
    SellerSuspended,
    SoldOut,
    RiskHold,
}

impl GateRejection {
    /// Fixed user-facing message set
    pub fn message(&self) -> String {
        match self {
            GateRejection::NotFound => "Voucher not found".to_string(),
            GateRejection::BeingProcessed => "Voucher is currently being processed".to_string(),
            GateRejection::WrongStatus(status) => {
                format!("Voucher status is {}", status.as_str())
            }
            GateRejection::NotAvailable => "Voucher is not available".to_string(),
            GateRejection::Expired => "Voucher has expired".to_string(),
            GateRejection::SelfPurchase => "You cannot purchase your own voucher".to_string(),
            GateRejection::SellerSuspended => "Seller account is suspended".to_string(),
            GateRejection::SoldOut => "Voucher is sold out".to_string(),
            GateRejection::RiskHold => {
                "Voucher is on hold pending fraud review".to_string()
            }
        }
    }
}

/// Outcome of the purchase gate.
///
/// `Cleared` means the caller now holds the lock and is responsible for
/// releasing it when the purchase completes or aborts. `Rejected` may carry
/// the voucher for display context; it is never a success.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    Cleared {
        voucher: Voucher,
    },
    Rejected {
        reason: GateRejection,
        message: String,
        voucher: Option<Voucher>,
    },
}

impl GateOutcome {
    pub fn rejected(reason: GateRejection, voucher: Option<Voucher>) -> Self {
        let message = reason.message();
        GateOutcome::Rejected {
            reason,
            message,
            voucher,
        }
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, GateOutcome::Cleared { .. })
    }
}

/// Summary returned by one expiry sweep pass
#[derive(Debug, Serialize, Default)]
pub struct SweepReport {
    pub archived: u32,
    pub skipped_in_flight: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_rejection_messages_are_distinct() {
        let msgs = [
            GateRejection::NotFound.message(),
            GateRejection::BeingProcessed.message(),
            GateRejection::WrongStatus(VoucherStatus::Draft).message(),
            GateRejection::NotAvailable.message(),
            GateRejection::Expired.message(),
            GateRejection::SelfPurchase.message(),
            GateRejection::SellerSuspended.message(),
            GateRejection::SoldOut.message(),
            GateRejection::RiskHold.message(),
        ];
        for (i, a) in msgs.iter().enumerate() {
            for (j, b) in msgs.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_wrong_status_message_includes_status() {
        let msg = GateRejection::WrongStatus(VoucherStatus::SoldOut).message();
        assert!(msg.contains("sold_out"));
    }

    #[test]
    fn test_rejected_outcome_is_not_cleared() {
        let outcome = GateOutcome::rejected(GateRejection::NotFound, None);
        assert!(!outcome.is_cleared());
    }
}
