//! Reconciliation poller.
//!
//! Drives pending settlement records to a terminal outcome. Per record:
//! claim it with an atomic `PENDING -> PROCESSING` update, then either
//! refund (past the timeout), settle per the provider's answer, or
//! release the claim for the next cycle. Per-record failures are caught,
//! logged, and never abort the batch.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use settla_core::ledger::{Account, EntryStatus, EntryType, LedgerCategory};
use settla_core::provider::{ProviderGateway, ProviderOutcome};
use settla_core::settlement::{ReconcileAction, RefundReason, reconcile_action};
use settla_db::entities::sea_orm_active_enums as db_enums;
use settla_db::entities::{bill_payments, ledger_entries, transfers};
use settla_db::repositories::{
    BillPaymentRepository, CreateEntryInput, LedgerRepository, TransferRepository,
};
use settla_shared::config::SettlementConfig;
use settla_shared::types::{Currency, UserId};
use settla_shared::{AppError, AppResult};

use crate::metrics::SettlementMetrics;
use crate::{db_err, secs};

/// What happened to one record during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Refunded,
    Waiting,
}

/// Counters for one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Records driven to COMPLETED.
    pub completed: u64,
    /// Records refunded and FAILED.
    pub refunded: u64,
    /// Records left pending for the next cycle.
    pub waiting: u64,
    /// Per-record failures caught and skipped.
    pub failures: u64,
}

impl CycleStats {
    fn bump(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Refunded => self.refunded += 1,
            Outcome::Waiting => self.waiting += 1,
        }
    }
}

/// Background worker reconciling pending settlements.
pub struct ReconciliationWorker {
    db: DatabaseConnection,
    ledger: LedgerRepository,
    transfers: TransferRepository,
    bills: BillPaymentRepository,
    gateway: Arc<dyn ProviderGateway>,
    config: SettlementConfig,
    metrics: Arc<SettlementMetrics>,
    shutdown: Arc<Notify>,
}

impl ReconciliationWorker {
    /// Creates the worker.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn ProviderGateway>,
        config: SettlementConfig,
        metrics: Arc<SettlementMetrics>,
    ) -> Self {
        Self {
            ledger: LedgerRepository::new(db.clone()),
            transfers: TransferRepository::new(db.clone()),
            bills: BillPaymentRepository::new(db.clone()),
            db,
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

    /// Spawns the polling loop.
    ///
    /// Fire-and-forget at a fixed interval; a failed cycle is logged and
    /// retried on the next tick, never fatal to the process.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("reconciliation worker started");
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = self.shutdown.notified() => {
                        info!("reconciliation worker stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.run_cycle().await {
                            Ok(stats) => debug!(?stats, "reconciliation cycle finished"),
                            Err(err) => {
                                warn!(error = %err, "reconciliation cycle failed; retrying next tick");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Runs one polling cycle over pending transfers and bill payments.
    ///
    /// # Errors
    ///
    /// Returns an error only if a pending batch cannot be fetched;
    /// everything per-record is caught and counted.
    pub async fn run_cycle(&self) -> AppResult<CycleStats> {
        self.metrics.poller_cycle();
        let mut stats = CycleStats::default();

        let batch = self
            .transfers
            .find_pending_batch(self.config.batch_size)
            .await
            .map_err(AppError::from)?;
        for record in batch {
            if !self.transfers.claim(record.id).await.map_err(AppError::from)? {
                continue;
            }
            match self.process_transfer(&record).await {
                Ok(outcome) => stats.bump(outcome),
                Err(err) => {
                    warn!(
                        transfer_id = %record.id,
                        error = %err,
                        "transfer reconciliation failed; record released for retry"
                    );
                    self.metrics.poller_record_failure();
                    if matches!(err, AppError::ProviderUnavailable(_)) {
                        self.metrics.provider_error();
                    }
                    if let Err(release_err) = self.transfers.release(record.id).await {
                        warn!(transfer_id = %record.id, error = %release_err, "failed to release claim");
                    }
                    stats.failures += 1;
                }
            }
        }

        let batch = self
            .bills
            .find_pending_batch(self.config.batch_size)
            .await
            .map_err(AppError::from)?;
        for record in batch {
            if !self.bills.claim(record.id).await.map_err(AppError::from)? {
                continue;
            }
            match self.process_bill(&record).await {
                Ok(outcome) => stats.bump(outcome),
                Err(err) => {
                    warn!(
                        bill_payment_id = %record.id,
                        error = %err,
                        "bill reconciliation failed; record released for retry"
                    );
                    self.metrics.poller_record_failure();
                    if matches!(err, AppError::ProviderUnavailable(_)) {
                        self.metrics.provider_error();
                    }
                    if let Err(release_err) = self.bills.release(record.id).await {
                        warn!(bill_payment_id = %record.id, error = %release_err, "failed to release claim");
                    }
                    stats.failures += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn decide(
        &self,
        created_at: sea_orm::prelude::DateTimeWithTimeZone,
        provider_ref: Option<&str>,
        reference: &str,
    ) -> AppResult<ReconcileAction> {
        let age = Utc::now().signed_duration_since(created_at.with_timezone(&Utc));
        let timeout = secs(self.config.refund_timeout_secs);

        // Past the timeout the provider is not consulted; otherwise only
        // dispatched records (those with a provider ref) are queried.
        let outcome: Option<ProviderOutcome> = if age > timeout || provider_ref.is_none() {
            None
        } else {
            let receipt = self
                .gateway
                .query_transfer(reference)
                .await
                .map_err(AppError::from)?;
            Some(receipt.outcome())
        };

        Ok(reconcile_action(age, timeout, outcome))
    }

    async fn process_transfer(&self, record: &transfers::Model) -> AppResult<Outcome> {
        let action = self
            .decide(record.created_at, record.provider_ref.as_deref(), &record.reference)
            .await?;

        match action {
            ReconcileAction::Complete => {
                self.complete_transfer(record).await?;
                Ok(Outcome::Completed)
            }
            ReconcileAction::Refund(reason) => {
                self.refund_transfer(record, reason).await?;
                Ok(Outcome::Refunded)
            }
            ReconcileAction::Wait => {
                self.transfers
                    .release(record.id)
                    .await
                    .map_err(AppError::from)?;
                Ok(Outcome::Waiting)
            }
        }
    }

    async fn complete_transfer(&self, record: &transfers::Model) -> AppResult<()> {
        let debit = self
            .find_pending_debit(record.trace_id, LedgerCategory::Transfer)
            .await?;

        let to_account = if record.transfer_type == "intra" {
            Account::from_str(&record.counterparty).map_err(AppError::Internal)?
        } else {
            Account::Provider("nip".to_string())
        };
        let beneficiary = match &to_account {
            Account::UserWallet(user) => Some(user.into_inner()),
            _ => None,
        };
        let currency = record
            .currency
            .parse::<Currency>()
            .map_err(AppError::Internal)?;

        let txn = self.db.begin().await.map_err(db_err)?;

        self.ledger
            .update_status_by_trace(&txn, record.trace_id, EntryStatus::Completed)
            .await
            .map_err(AppError::from)?;

        let mut credit = CreateEntryInput::pending(
            record.trace_id,
            beneficiary,
            to_account,
            EntryType::Credit,
            LedgerCategory::Transfer,
            record.amount,
            currency,
        );
        credit.status = EntryStatus::Completed;
        credit.related_to = Some(debit.id);
        credit.meta = serde_json::json!({
            "reference": record.reference,
            "provider_ref": record.provider_ref,
        });
        self.ledger
            .create_entry(&txn, credit)
            .await
            .map_err(AppError::from)?;

        if !self
            .transfers
            .mark_completed(&txn, record.id)
            .await
            .map_err(AppError::from)?
        {
            txn.rollback().await.map_err(db_err)?;
            return Err(AppError::Conflict(format!(
                "transfer {} lost its claim during completion",
                record.id
            )));
        }

        txn.commit().await.map_err(db_err)?;

        self.metrics.entries_created(LedgerCategory::Transfer, 1);
        self.metrics.settlement_completed();
        self.metrics.pending_adjust(-1);
        info!(transfer_id = %record.id, reference = %record.reference, "transfer completed");
        Ok(())
    }

    async fn process_bill(&self, record: &bill_payments::Model) -> AppResult<Outcome> {
        let action = self
            .decide(record.created_at, record.provider_ref.as_deref(), &record.reference)
            .await?;

        match action {
            ReconcileAction::Complete => {
                self.complete_bill(record).await?;
                Ok(Outcome::Completed)
            }
            ReconcileAction::Refund(reason) => {
                self.refund_bill(record, reason).await?;
                Ok(Outcome::Refunded)
            }
            ReconcileAction::Wait => {
                self.bills
                    .release(record.id)
                    .await
                    .map_err(AppError::from)?;
                Ok(Outcome::Waiting)
            }
        }
    }

    async fn complete_bill(&self, record: &bill_payments::Model) -> AppResult<()> {
        let debit = self
            .find_pending_debit(record.trace_id, LedgerCategory::BillPayment)
            .await?;
        let currency = record
            .currency
            .parse::<Currency>()
            .map_err(AppError::Internal)?;

        let txn = self.db.begin().await.map_err(db_err)?;

        // Completes the bill debit and the fee pair on the same trace.
        self.ledger
            .update_status_by_trace(&txn, record.trace_id, EntryStatus::Completed)
            .await
            .map_err(AppError::from)?;

        let mut credit = CreateEntryInput::pending(
            record.trace_id,
            None,
            Account::Provider(record.biller.clone()),
            EntryType::Credit,
            LedgerCategory::BillPayment,
            record.amount,
            currency,
        );
        credit.status = EntryStatus::Completed;
        credit.related_to = Some(debit.id);
        credit.subtype = Some(record.biller.clone());
        credit.meta = serde_json::json!({
            "reference": record.reference,
            "provider_ref": record.provider_ref,
        });
        self.ledger
            .create_entry(&txn, credit)
            .await
            .map_err(AppError::from)?;

        if !self
            .bills
            .mark_completed(&txn, record.id)
            .await
            .map_err(AppError::from)?
        {
            txn.rollback().await.map_err(db_err)?;
            return Err(AppError::Conflict(format!(
                "bill payment {} lost its claim during completion",
                record.id
            )));
        }

        txn.commit().await.map_err(db_err)?;

        self.metrics.entries_created(LedgerCategory::BillPayment, 1);
        self.metrics.settlement_completed();
        self.metrics.pending_adjust(-1);
        info!(bill_payment_id = %record.id, reference = %record.reference, "bill payment completed");
        Ok(())
    }

    /// Refunds a claimed transfer: fails the trace, posts the
    /// compensating refund CREDIT, and marks the record FAILED, all in
    /// one atomic unit.
    async fn refund_transfer(
        &self,
        record: &transfers::Model,
        reason: RefundReason,
    ) -> AppResult<()> {
        let debit = self
            .find_pending_debit(record.trace_id, LedgerCategory::Transfer)
            .await?;

        let txn = self.db.begin().await.map_err(db_err)?;
        self.post_refund(&txn, record.trace_id, record.user_id, &debit, &record.reference, reason)
            .await?;
        if !self
            .transfers
            .mark_failed(&txn, record.id)
            .await
            .map_err(AppError::from)?
        {
            txn.rollback().await.map_err(db_err)?;
            return Err(AppError::Conflict(format!(
                "transfer {} lost its claim during refund",
                record.id
            )));
        }
        txn.commit().await.map_err(db_err)?;

        self.metrics.entries_created(LedgerCategory::Refund, 1);
        self.metrics.settlement_refunded();
        self.metrics.pending_adjust(-1);
        info!(transfer_id = %record.id, ?reason, "transfer refunded");
        Ok(())
    }

    /// Refunds a claimed bill payment. The fee pair fails with the
    /// trace and cancels itself; only the bill amount is refunded.
    async fn refund_bill(
        &self,
        record: &bill_payments::Model,
        reason: RefundReason,
    ) -> AppResult<()> {
        let debit = self
            .find_pending_debit(record.trace_id, LedgerCategory::BillPayment)
            .await?;

        let txn = self.db.begin().await.map_err(db_err)?;
        self.post_refund(&txn, record.trace_id, record.user_id, &debit, &record.reference, reason)
            .await?;
        if !self
            .bills
            .mark_failed(&txn, record.id)
            .await
            .map_err(AppError::from)?
        {
            txn.rollback().await.map_err(db_err)?;
            return Err(AppError::Conflict(format!(
                "bill payment {} lost its claim during refund",
                record.id
            )));
        }
        txn.commit().await.map_err(db_err)?;

        self.metrics.entries_created(LedgerCategory::Refund, 1);
        self.metrics.settlement_refunded();
        self.metrics.pending_adjust(-1);
        info!(bill_payment_id = %record.id, ?reason, "bill payment refunded");
        Ok(())
    }

    /// Fails every pending entry of the trace and posts the completed
    /// refund CREDIT back to the payer, referencing the failed debit.
    async fn post_refund<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        trace_id: uuid::Uuid,
        user_id: uuid::Uuid,
        debit: &ledger_entries::Model,
        reference: &str,
        reason: RefundReason,
    ) -> AppResult<()> {
        let currency = debit
            .currency
            .parse::<Currency>()
            .map_err(AppError::Internal)?;

        self.ledger
            .update_status_by_trace(conn, trace_id, EntryStatus::Failed)
            .await
            .map_err(AppError::from)?;

        let mut refund = CreateEntryInput::pending(
            trace_id,
            Some(user_id),
            Account::UserWallet(UserId::from_uuid(user_id)),
            EntryType::Credit,
            LedgerCategory::Refund,
            debit.amount,
            currency,
        );
        refund.status = EntryStatus::Completed;
        refund.related_to = Some(debit.id);
        refund.meta = serde_json::json!({
            "reference": reference,
            "reason": match reason {
                RefundReason::Timeout => "timeout",
                RefundReason::ProviderFailed => "provider-failed",
            },
        });
        self.ledger
            .create_entry(conn, refund)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    /// The original pending debit of a trace, fetched before any
    /// transaction is opened.
    async fn find_pending_debit(
        &self,
        trace_id: uuid::Uuid,
        category: LedgerCategory,
    ) -> AppResult<ledger_entries::Model> {
        let entries = self
            .ledger
            .get_by_trace_id(trace_id)
            .await
            .map_err(AppError::from)?;

        entries
            .into_iter()
            .find(|entry| {
                entry.entry_type == db_enums::EntryType::Debit
                    && entry.status == db_enums::EntryStatus::Pending
                    && entry.category == category.to_string()
            })
            .ok_or_else(|| {
                AppError::Inconsistency(format!(
                    "trace {trace_id} has no pending {category} debit to settle"
                ))
            })
    }
}
