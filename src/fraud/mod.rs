//! Fraud scoring domain module
//!
//! Contains the incident models, the weight/threshold configuration, and the
//! scoring engine.

pub mod config;
pub mod engine;
pub mod model;

pub use config::{FraudConfig, RiskThresholds};
pub use engine::{evaluate_user, evaluate_voucher, FraudEngine, UserSignalInputs, VoucherSignalInputs};
pub use model::{Assessment, DetectedSignal, FraudIncident, IncidentType, Severity};
