//! Outbox dispatcher worker.
//!
//! Drains the outbox: claims each unprocessed event, performs the
//! provider call it records, and marks the event processed. Delivery is
//! at-least-once; a crash between the provider call and
//! `mark_processed` causes a redelivery, which the provider deduplicates
//! by reference.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use settla_core::provider::{ProviderGateway, TransferKind, TransferRequest};
use settla_db::entities::outbox_events;
use settla_db::repositories::{BillPaymentRepository, OutboxRepository, TransferRepository};
use settla_shared::config::SettlementConfig;
use settla_shared::{AppError, AppResult};

use crate::metrics::SettlementMetrics;
use crate::{json_err, secs};

/// Topic for queued transfer dispatches.
pub const TOPIC_TRANSFER_INITIATE: &str = "transfer.initiate";
/// Topic for queued bill payment dispatches.
pub const TOPIC_BILL_PAYMENT_INITIATE: &str = "bill-payment.initiate";

/// Outbox payload for a transfer dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDispatchPayload {
    /// Domain record the dispatch belongs to.
    pub transfer_id: Uuid,
    /// Unique reference sent to the provider.
    pub reference: String,
    /// Source account.
    pub from_account: String,
    /// Destination account.
    pub to_account: String,
    /// Amount in minor units.
    pub amount_minor_units: i64,
    /// Intra- or inter-bank.
    pub transfer_type: TransferKind,
    /// Optional statement remark.
    pub remark: Option<String>,
}

/// Outbox payload for a bill payment dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillDispatchPayload {
    /// Domain record the dispatch belongs to.
    pub bill_payment_id: Uuid,
    /// Unique reference sent to the provider.
    pub reference: String,
    /// Biller slug.
    pub biller: String,
    /// Customer identifier at the biller.
    pub customer_ref: String,
    /// Source account.
    pub from_account: String,
    /// Amount in minor units.
    pub amount_minor_units: i64,
}

/// Background worker draining the outbox.
pub struct OutboxDispatcher {
    outbox: OutboxRepository,
    transfers: TransferRepository,
    bills: BillPaymentRepository,
    gateway: Arc<dyn ProviderGateway>,
    config: SettlementConfig,
    metrics: Arc<SettlementMetrics>,
    shutdown: Arc<Notify>,
}

impl OutboxDispatcher {
    /// Creates the dispatcher.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn ProviderGateway>,
        config: SettlementConfig,
        metrics: Arc<SettlementMetrics>,
    ) -> Self {
        Self {
            outbox: OutboxRepository::new(db.clone()),
            transfers: TransferRepository::new(db.clone()),
            bills: BillPaymentRepository::new(db),
            gateway,
            config,
            metrics,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop the worker.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Spawns the dispatch loop.
    ///
    /// Fire-and-forget at a fixed interval; a failed cycle is logged and
    /// retried on the next tick, never fatal to the process.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("outbox dispatcher started");
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.dispatch_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = self.shutdown.notified() => {
                        info!("outbox dispatcher stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.run_cycle().await {
                            Ok(dispatched) if dispatched > 0 => {
                                debug!(dispatched, "outbox cycle finished");
                            }
                            Ok(_) => {}
                            Err(err) => {
                                warn!(error = %err, "outbox cycle failed; retrying next tick");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Runs one dispatch cycle; returns the number of events dispatched.
    ///
    /// Per-event failures are recorded on the event (retry count, last
    /// error) and never abort the batch.
    ///
    /// # Errors
    ///
    /// Returns an error only if the batch itself cannot be fetched.
    pub async fn run_cycle(&self) -> AppResult<u64> {
        let events = self
            .outbox
            .fetch_unprocessed(self.config.batch_size)
            .await
            .map_err(AppError::from)?;

        let visibility = secs(self.config.claim_visibility_secs);
        let mut dispatched = 0;

        for event in events {
            if !self
                .outbox
                .claim(event.id, visibility)
                .await
                .map_err(AppError::from)?
            {
                continue;
            }

            match self.dispatch(&event).await {
                Ok(()) => {
                    self.outbox
                        .mark_processed(event.id)
                        .await
                        .map_err(AppError::from)?;
                    self.metrics.outbox_dispatched();
                    dispatched += 1;
                }
                Err(err) => {
                    warn!(
                        event_id = %event.id,
                        topic = %event.topic,
                        error = %err,
                        "outbox dispatch failed; will retry"
                    );
                    if matches!(err, AppError::ProviderUnavailable(_)) {
                        self.metrics.provider_error();
                    }
                    self.metrics.outbox_failure();
                    self.outbox
                        .mark_failed(event.id, &err.to_string())
                        .await
                        .map_err(AppError::from)?;
                }
            }
        }

        Ok(dispatched)
    }

    async fn dispatch(&self, event: &outbox_events::Model) -> AppResult<()> {
        match event.topic.as_str() {
            TOPIC_TRANSFER_INITIATE => {
                let payload: TransferDispatchPayload =
                    serde_json::from_value(event.payload.clone()).map_err(json_err)?;
                let receipt = self
                    .gateway
                    .transfer(&TransferRequest {
                        from_account: payload.from_account.clone(),
                        to_account: payload.to_account.clone(),
                        amount_minor_units: payload.amount_minor_units,
                        reference: payload.reference.clone(),
                        remark: payload.remark.clone(),
                        transfer_type: payload.transfer_type,
                    })
                    .await
                    .map_err(AppError::from)?;

                let provider_ref = receipt
                    .txn_id
                    .unwrap_or_else(|| payload.reference.clone());
                self.transfers
                    .set_provider_ref(payload.transfer_id, &provider_ref, receipt.session_id.as_deref())
                    .await
                    .map_err(AppError::from)?;
                Ok(())
            }
            TOPIC_BILL_PAYMENT_INITIATE => {
                let payload: BillDispatchPayload =
                    serde_json::from_value(event.payload.clone()).map_err(json_err)?;
                let receipt = self
                    .gateway
                    .transfer(&TransferRequest {
                        from_account: payload.from_account.clone(),
                        to_account: format!("biller:{}", payload.biller),
                        amount_minor_units: payload.amount_minor_units,
                        reference: payload.reference.clone(),
                        remark: Some(format!("{} {}", payload.biller, payload.customer_ref)),
                        transfer_type: TransferKind::Inter,
                    })
                    .await
                    .map_err(AppError::from)?;

                let provider_ref = receipt
                    .txn_id
                    .unwrap_or_else(|| payload.reference.clone());
                self.bills
                    .set_provider_ref(payload.bill_payment_id, &provider_ref)
                    .await
                    .map_err(AppError::from)?;
                Ok(())
            }
            other => Err(AppError::Internal(format!("unknown outbox topic: {other}"))),
        }
    }
}
