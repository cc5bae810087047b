//! Settla settlement worker
//!
//! Main entry point for the settlement backend: connects to the store,
//! builds the provider gateway behind its circuit breaker, and runs the
//! outbox dispatcher, the reconciliation poller, and the idempotency
//! sweeper until shutdown.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settla_core::provider::{GuardedGateway, HttpProviderGateway, ProviderGateway};
use settla_db::connect;
use settla_settlement::{
    IdempotencySweeper, OutboxDispatcher, ReconciliationWorker, SettlementMetrics,
};
use settla_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "settla=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Provider gateway behind the circuit breaker
    let gateway = HttpProviderGateway::new(&config.provider)
        .map_err(|err| anyhow::anyhow!("failed to build provider gateway: {err}"))?;
    let gateway: Arc<dyn ProviderGateway> =
        Arc::new(GuardedGateway::new(gateway, &config.provider));
    info!(base_url = %config.provider.base_url, "Provider gateway configured");

    let metrics = Arc::new(SettlementMetrics::new());

    // Background workers
    let dispatcher = OutboxDispatcher::new(
        db.clone(),
        gateway.clone(),
        config.settlement.clone(),
        metrics.clone(),
    );
    let dispatcher_shutdown = dispatcher.shutdown_handle();
    let dispatcher_handle = dispatcher.start();

    let reconciler = ReconciliationWorker::new(
        db.clone(),
        gateway,
        config.settlement.clone(),
        metrics.clone(),
    );
    let reconciler_shutdown = reconciler.shutdown_handle();
    let reconciler_handle = reconciler.start();

    let sweeper = IdempotencySweeper::new(db, config.settlement.clone());
    let sweeper_shutdown = sweeper.shutdown_handle();
    let sweeper_handle = sweeper.start();

    info!(
        poll_interval_secs = config.settlement.poll_interval_secs,
        dispatch_interval_secs = config.settlement.dispatch_interval_secs,
        refund_timeout_secs = config.settlement.refund_timeout_secs,
        "Settlement workers running"
    );

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    dispatcher_shutdown.notify_one();
    reconciler_shutdown.notify_one();
    sweeper_shutdown.notify_one();

    let _ = tokio::join!(dispatcher_handle, reconciler_handle, sweeper_handle);
    info!(metrics = ?metrics.snapshot(), "Settlement workers stopped");

    Ok(())
}
