//! Expiry sweep integration tests
//!
//! Run with a dedicated test database:
//!
//!   TEST_DATABASE_URL=postgresql://localhost/vouchex_test cargo test -- --ignored

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use vouchex_server::fraud::{FraudConfig, FraudEngine};
use vouchex_server::sinks::Sinks;
use vouchex_server::voucher::{Sweeper, VoucherService, VoucherStatus};

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

fn build_sweeper(pool: &PgPool) -> Sweeper {
    let sinks = Sinks::new(pool.clone());
    let engine = FraudEngine::new(pool.clone(), FraudConfig::default(), sinks.clone());
    let service = VoucherService::new(pool.clone(), dec!(0.10), [7u8; 32], engine, sinks.clone());
    Sweeper::new(pool.clone(), service, sinks)
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

async fn seed_voucher(pool: &PgPool, owner_id: Uuid, expired: bool) -> Uuid {
    let id = Uuid::new_v4();
    let expiry = if expired {
        Utc::now() - Duration::days(1)
    } else {
        Utc::now() + Duration::days(30)
    };
    sqlx::query(
        r#"
        INSERT INTO vouchers (
            id, owner_id, brand, category, original_price, listed_price,
            quantity, status, scratch_code_enc, scratch_code_hash, expiry_date
        )
        VALUES ($1, $2, 'steam', 'gaming', 60, 40, 1, 'published', 'enc', $3, $4)
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(format!("hash-{}", id))
    .bind(expiry)
    .execute(pool)
    .await
    .expect("Failed to seed voucher");
    id
}

async fn voucher_status(pool: &PgPool, voucher_id: Uuid) -> (VoucherStatus, bool) {
    sqlx::query_as("SELECT status, is_active FROM vouchers WHERE id = $1")
        .bind(voucher_id)
        .fetch_one(pool)
        .await
        .expect("Voucher should exist")
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_expired_voucher_archived_and_stamped() {
    let pool = setup_test_db().await;
    let sweeper = build_sweeper(&pool);

    let owner = seed_user(&pool).await;
    let voucher_id = seed_voucher(&pool, owner, true).await;

    let report = sweeper
        .run_expiry_sweep()
        .await
        .expect("Sweep should succeed");
    assert!(report.archived >= 1);

    let (status, is_active) = voucher_status(&pool, voucher_id).await;
    assert_eq!(status, VoucherStatus::Expired);
    assert!(!is_active);

    let (archive_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM voucher_archives WHERE voucher_id = $1")
            .bind(voucher_id)
            .fetch_one(&pool)
            .await
            .expect("Query should succeed");
    assert_eq!(archive_count, 1);

    // Owner was told about it.
    let (notification_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(owner)
            .fetch_one(&pool)
            .await
            .expect("Query should succeed");
    assert!(notification_count >= 1);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_unexpired_voucher_untouched() {
    let pool = setup_test_db().await;
    let sweeper = build_sweeper(&pool);

    let owner = seed_user(&pool).await;
    let voucher_id = seed_voucher(&pool, owner, false).await;

    sweeper
        .run_expiry_sweep()
        .await
        .expect("Sweep should succeed");

    let (status, is_active) = voucher_status(&pool, voucher_id).await;
    assert_eq!(status, VoucherStatus::Published);
    assert!(is_active);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_in_flight_order_defers_expiry() {
    let pool = setup_test_db().await;
    let sweeper = build_sweeper(&pool);

    let owner = seed_user(&pool).await;
    let buyer = seed_user(&pool).await;
    let voucher_id = seed_voucher(&pool, owner, true).await;

    sqlx::query(
        r#"
        INSERT INTO orders (id, voucher_id, buyer_id, amount, status)
        VALUES ($1, $2, $3, 40, 'awaiting_payment')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(voucher_id)
    .bind(buyer)
    .execute(&pool)
    .await
    .expect("Failed to seed order");

    let report = sweeper
        .run_expiry_sweep()
        .await
        .expect("Sweep should succeed");
    assert!(report.skipped_in_flight >= 1);

    // Still live; the next pass after settlement will pick it up.
    let (status, _) = voucher_status(&pool, voucher_id).await;
    assert_eq!(status, VoucherStatus::Published);

    // Settle the order and sweep again.
    sqlx::query("UPDATE orders SET status = 'completed' WHERE voucher_id = $1")
        .bind(voucher_id)
        .execute(&pool)
        .await
        .expect("Update should succeed");

    sweeper
        .run_expiry_sweep()
        .await
        .expect("Sweep should succeed");

    let (status, is_active) = voucher_status(&pool, voucher_id).await;
    assert_eq!(status, VoucherStatus::Expired);
    assert!(!is_active);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_held_lock_defers_expiry() {
    let pool = setup_test_db().await;
    let sweeper = build_sweeper(&pool);

    let owner = seed_user(&pool).await;
    let voucher_id = seed_voucher(&pool, owner, true).await;

    // A cleared gate holds the lock before any order row exists; the sweep
    // must leave the voucher alone rather than cancel the purchase.
    sqlx::query("UPDATE vouchers SET is_locked = TRUE WHERE id = $1")
        .bind(voucher_id)
        .execute(&pool)
        .await
        .expect("Update should succeed");

    sweeper
        .run_expiry_sweep()
        .await
        .expect("Sweep should succeed");

    let (status, is_locked): (VoucherStatus, bool) =
        sqlx::query_as("SELECT status, is_locked FROM vouchers WHERE id = $1")
            .bind(voucher_id)
            .fetch_one(&pool)
            .await
            .expect("Voucher should exist");
    assert_eq!(status, VoucherStatus::Published);
    assert!(is_locked);

    let (archive_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM voucher_archives WHERE voucher_id = $1")
            .bind(voucher_id)
            .fetch_one(&pool)
            .await
            .expect("Query should succeed");
    assert_eq!(archive_count, 0);

    // Once the lock is released the next pass archives it.
    sqlx::query("UPDATE vouchers SET is_locked = FALSE WHERE id = $1")
        .bind(voucher_id)
        .execute(&pool)
        .await
        .expect("Update should succeed");

    sweeper
        .run_expiry_sweep()
        .await
        .expect("Sweep should succeed");

    let (status, is_active) = voucher_status(&pool, voucher_id).await;
    assert_eq!(status, VoucherStatus::Expired);
    assert!(!is_active);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_sweep_is_idempotent() {
    let pool = setup_test_db().await;
    let sweeper = build_sweeper(&pool);

    let owner = seed_user(&pool).await;
    let voucher_id = seed_voucher(&pool, owner, true).await;

    sweeper
        .run_expiry_sweep()
        .await
        .expect("Sweep should succeed");
    sweeper
        .run_expiry_sweep()
        .await
        .expect("Second sweep should succeed");

    // Only one archive row regardless of how many passes ran.
    let (archive_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM voucher_archives WHERE voucher_id = $1")
            .bind(voucher_id)
            .fetch_one(&pool)
            .await
            .expect("Query should succeed");
    assert_eq!(archive_count, 1);
}
