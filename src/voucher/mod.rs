//! Voucher domain module
//!
//! Lifecycle models, code validation, the purchase gate, and the
//! expiry/fraud sweeps.

pub mod code_validator;
pub mod model;
pub mod service;
pub mod sweep;

pub use model::{
    CreateVoucherRequest, GateOutcome, GateRejection, ListVouchersQuery, SweepReport,
    UpdateVoucherRequest, VerificationStatus, Voucher, VoucherArchive, VoucherStatus,
};
pub use service::VoucherService;
pub use sweep::Sweeper;
