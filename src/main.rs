//! Voucher marketplace backend server
//!
//! HTTP API for the peer-to-peer voucher resale core: voucher lifecycle and
//! the concurrency-safe purchase gate, fraud scoring, the wallet ledger, and
//! the scheduled expiry/fraud sweeps.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tokio::signal;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::cors::{Any, CorsLayer};

use vouchex_server::app_state::AppState;
use vouchex_server::config::Config;
use vouchex_server::fraud::{FraudConfig, FraudEngine};
use vouchex_server::sinks::Sinks;
use vouchex_server::voucher::{Sweeper, VoucherService};
use vouchex_server::wallet::WalletService;
use vouchex_server::{db, handlers, middleware, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let sinks = Sinks::new(db_pool.clone());
    let fraud_engine = FraudEngine::new(db_pool.clone(), FraudConfig::default(), sinks.clone());
    let voucher_service = VoucherService::new(
        db_pool.clone(),
        config.platform_fee_percent,
        config.code_encryption_key,
        fraud_engine.clone(),
        sinks.clone(),
    );
    let sweeper = Sweeper::new(db_pool.clone(), voucher_service.clone(), sinks.clone());
    let wallet_service = WalletService::new(db_pool.clone());

    let app_state = AppState::new(
        db_pool.clone(),
        Arc::new(voucher_service),
        Arc::new(wallet_service),
        Arc::new(fraud_engine),
        Arc::new(sweeper.clone()),
    );

    start_sweeps(sweeper).await?;

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .merge(routes::voucher_routes())
        .merge(routes::wallet_routes())
        .merge(routes::fraud_routes())
        .merge(routes::sweep_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "Voucher Marketplace API Server"
}

/// Schedule the background sweeps and run both once at startup so a restart
/// never leaves overdue work waiting for the next tick.
async fn start_sweeps(sweeper: Sweeper) -> anyhow::Result<()> {
    let startup_sweeper = sweeper.clone();
    tokio::spawn(async move {
        if let Err(e) = startup_sweeper.run_expiry_sweep().await {
            tracing::error!(error = %e, "Startup expiry sweep failed");
        }
        if let Err(e) = startup_sweeper.run_fraud_sweep().await {
            tracing::error!(error = %e, "Startup fraud sweep failed");
        }
    });

    let scheduler = JobScheduler::new().await?;

    let expiry_sweeper = sweeper.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _lock| {
            let sweeper = expiry_sweeper.clone();
            Box::pin(async move {
                if let Err(e) = sweeper.run_expiry_sweep().await {
                    tracing::error!(error = %e, "Scheduled expiry sweep failed");
                }
            })
        })?)
        .await?;

    let fraud_sweeper = sweeper;
    scheduler
        .add(Job::new_async("0 0 */4 * * *", move |_uuid, _lock| {
            let sweeper = fraud_sweeper.clone();
            Box::pin(async move {
                if let Err(e) = sweeper.run_fraud_sweep().await {
                    tracing::error!(error = %e, "Scheduled fraud sweep failed");
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Background sweeps scheduled (expiry hourly, fraud every 4 hours)");

    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(origins_str) = allowed_origins.filter(|s| !s.is_empty()) else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
