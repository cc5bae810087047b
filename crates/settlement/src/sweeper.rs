//! Idempotency sweeper.
//!
//! Deletes expired idempotency records on an interval. Space
//! reclamation only: expired records already stop matching in `check`,
//! so the sweeper is never a correctness dependency.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use settla_db::repositories::IdempotencyRepository;
use settla_shared::config::SettlementConfig;
use settla_shared::{AppError, AppResult};

/// Background worker reclaiming expired idempotency records.
pub struct IdempotencySweeper {
    idempotency: IdempotencyRepository,
    config: SettlementConfig,
    shutdown: Arc<Notify>,
}

impl IdempotencySweeper {
    /// Creates the sweeper.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: SettlementConfig) -> Self {
        Self {
            idempotency: IdempotencyRepository::new(db),
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop the worker.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Spawns the sweep loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("idempotency sweeper started");
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = self.shutdown.notified() => {
                        info!("idempotency sweeper stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.run_once().await {
                            Ok(swept) if swept > 0 => debug!(swept, "idempotency sweep finished"),
                            Ok(_) => {}
                            Err(err) => {
                                warn!(error = %err, "idempotency sweep failed; retrying next tick");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Runs one sweep; returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn run_once(&self) -> AppResult<u64> {
        self.idempotency
            .sweep_expired()
            .await
            .map_err(AppError::from)
    }
}
