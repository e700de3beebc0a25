//! Fraud incident records and assessment types

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::RiskLevel;

/// Category of a detected fraud signal
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "incident_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    DuplicateCode,
    AbnormalDiscount,
    SuspiciousUpload,
    FailedAuthLimit,
    Other,
}

/// Severity of a detected fraud signal
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "incident_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Low/medium incidents also push a warning notification to the user.
    pub fn warns_user(&self) -> bool {
        matches!(self, Severity::Low | Severity::Medium)
    }
}

/// Append-only record of a single detected fraud signal. Never mutated.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct FraudIncident {
    pub id: Uuid,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub evidence: String,
    pub user_id: Uuid,
    pub voucher_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One triggered signal during an analysis pass
#[derive(Debug, Serialize, Clone)]
pub struct DetectedSignal {
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub weight: i32,
    pub evidence: String,
}

/// Result of scoring a voucher or user: the recomputed-from-scratch score,
/// its classification, and every signal that contributed.
#[derive(Debug, Serialize, Clone)]
pub struct Assessment {
    pub score: i32,
    pub level: RiskLevel,
    pub signals: Vec<DetectedSignal>,
}
