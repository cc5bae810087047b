//! Settlement orchestrators and reconciliation workers.
//!
//! Each orchestrator composes the money codec, ledger, outbox, and
//! idempotency guard inside one atomic unit per request:
//! check the guard first, then write domain record + pending ledger
//! postings + outbox intent in a single transaction, commit, and only
//! then persist the idempotency record.
//!
//! The background workers resolve the eventual state of
//! provider-dependent operations: the outbox dispatcher performs the
//! queued provider calls, the reconciliation poller drives pending
//! records to a terminal outcome (including the timeout auto-refund),
//! and the sweeper reclaims expired idempotency records.

pub mod bill_payment;
pub mod dispatcher;
pub mod loan;
pub mod metrics;
pub mod reconciler;
pub mod reference;
pub mod savings;
pub mod sweeper;
pub mod transfer;

pub use bill_payment::{BillPaymentReceipt, BillPaymentService, PayBillRequest};
pub use dispatcher::OutboxDispatcher;
pub use loan::{ApplyLoanRequest, LoanReceipt, LoanService};
pub use metrics::{MetricsSnapshot, SettlementMetrics};
pub use reconciler::{CycleStats, ReconciliationWorker};
pub use savings::{SavingsReceipt, SavingsRequest, SavingsService};
pub use sweeper::IdempotencySweeper;
pub use transfer::{InitiateTransferRequest, TransferDestination, TransferReceipt, TransferService};

/// Converts configured whole seconds into a signed `chrono::Duration`.
pub(crate) fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

pub(crate) fn db_err(err: sea_orm::DbErr) -> settla_shared::AppError {
    settla_shared::AppError::Database(err.to_string())
}

pub(crate) fn json_err(err: serde_json::Error) -> settla_shared::AppError {
    settla_shared::AppError::Internal(err.to_string())
}
