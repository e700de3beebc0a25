//! Fraud engine integration tests
//!
//! Exercises the persisted side of an analysis pass: score/level stamps,
//! the Critical force-reject on vouchers, and one-shot user suspension.
//!
//! Run with a dedicated test database:
//!
//!   TEST_DATABASE_URL=postgresql://localhost/vouchex_test cargo test -- --ignored

use sqlx::PgPool;
use uuid::Uuid;

use vouchex_server::fraud::{FraudConfig, FraudEngine};
use vouchex_server::models::RiskLevel;
use vouchex_server::sinks::Sinks;
use vouchex_server::voucher::VoucherStatus;

async fn setup_test_db() -> PgPool {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/vouchex_test".to_string());

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

fn build_engine(pool: &PgPool) -> FraudEngine {
    let sinks = Sinks::new(pool.clone());
    FraudEngine::new(pool.clone(), FraudConfig::default(), sinks)
}

async fn seed_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, display_name) VALUES ($1, $2)")
        .bind(id)
        .bind(format!("user-{}", id))
        .execute(pool)
        .await
        .expect("Failed to seed user");
    id
}

async fn seed_voucher(pool: &PgPool, owner_id: Uuid, code_hash: &str, risk: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO vouchers (
            id, owner_id, brand, category, original_price, listed_price,
            quantity, status, scratch_code_enc, scratch_code_hash,
            fraud_risk_level, expiry_date
        )
        VALUES ($1, $2, 'steam', 'gaming', 60, 40, 1, 'published', 'enc',
                $3, $4::risk_level, NOW() + INTERVAL '30 days')
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(code_hash)
    .bind(risk)
    .execute(pool)
    .await
    .expect("Failed to seed voucher");
    id
}

// ============================================================================
// Voucher Analysis Persistence
// ============================================================================

#[tokio::test]
#[ignore] // Requires database setup
async fn test_critical_voucher_force_rejected() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    // Two active listings sharing one code hash: the duplicate-active signal
    // alone carries a Critical score.
    let shared_hash = format!("dup-hash-{}", Uuid::new_v4());
    let first_owner = seed_user(&pool).await;
    let second_owner = seed_user(&pool).await;
    let voucher_id = seed_voucher(&pool, first_owner, &shared_hash, "low").await;
    seed_voucher(&pool, second_owner, &shared_hash, "low").await;

    let assessment = engine
        .analyze_voucher(voucher_id)
        .await
        .expect("Analysis should succeed");
    assert_eq!(assessment.level, RiskLevel::Critical);
    assert!(assessment.score >= 80);

    // The verdict was persisted and the voucher pulled from the marketplace.
    let (status, is_active, level): (VoucherStatus, bool, RiskLevel) = sqlx::query_as(
        "SELECT status, is_active, fraud_risk_level FROM vouchers WHERE id = $1",
    )
    .bind(voucher_id)
    .fetch_one(&pool)
    .await
    .expect("Voucher should exist");
    assert_eq!(status, VoucherStatus::Rejected);
    assert!(!is_active);
    assert_eq!(level, RiskLevel::Critical);

    // The duplicate signal left an incident trail.
    let (incident_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM fraud_incidents WHERE voucher_id = $1")
            .bind(voucher_id)
            .fetch_one(&pool)
            .await
            .expect("Query should succeed");
    assert!(incident_count >= 1);
}

// ============================================================================
// User Suspension
// ============================================================================

#[tokio::test]
#[ignore] // Requires database setup
async fn test_critical_user_suspended_exactly_once() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    // Six critical-risk vouchers push the owner past the bulk bonus and onto
    // a Critical user score.
    let owner = seed_user(&pool).await;
    for _ in 0..6 {
        let hash = format!("hash-{}", Uuid::new_v4());
        seed_voucher(&pool, owner, &hash, "critical").await;
    }

    let assessment = engine
        .analyze_user(owner)
        .await
        .expect("Analysis should succeed");
    assert_eq!(assessment.level, RiskLevel::Critical);

    let (is_suspended, reason, trust): (bool, Option<String>, i32) = sqlx::query_as(
        "SELECT is_suspended, suspension_reason, trust_score FROM users WHERE id = $1",
    )
    .bind(owner)
    .fetch_one(&pool)
    .await
    .expect("User should exist");
    assert!(is_suspended);
    assert!(reason.is_some());
    assert_eq!(trust, 50);

    // Re-running the analysis keeps the verdict but must not suspend again.
    let assessment = engine
        .analyze_user(owner)
        .await
        .expect("Second analysis should succeed");
    assert_eq!(assessment.level, RiskLevel::Critical);

    let (is_suspended, trust): (bool, i32) =
        sqlx::query_as("SELECT is_suspended, trust_score FROM users WHERE id = $1")
            .bind(owner)
            .fetch_one(&pool)
            .await
            .expect("User should exist");
    assert!(is_suspended);
    // Penalty re-applies per pass, floored at zero.
    assert_eq!(trust, 0);

    // Exactly one suspension incident across both passes.
    let (suspension_incidents,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM fraud_incidents
        WHERE user_id = $1 AND voucher_id IS NULL AND severity = 'critical'
        "#,
    )
    .bind(owner)
    .fetch_one(&pool)
    .await
    .expect("Query should succeed");
    assert_eq!(suspension_incidents, 1);
}
