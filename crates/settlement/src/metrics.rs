//! Process-local settlement metrics.
//!
//! Side-channel observability counters consumed by an external
//! collector; never part of the correctness contract.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use settla_core::ledger::LedgerCategory;

/// Counters for ledger, poller, and provider activity.
#[derive(Debug, Default)]
pub struct SettlementMetrics {
    entries_created: DashMap<String, u64>,
    settlements_completed: AtomicU64,
    settlements_refunded: AtomicU64,
    poller_cycles: AtomicU64,
    poller_record_failures: AtomicU64,
    outbox_dispatched: AtomicU64,
    outbox_failures: AtomicU64,
    provider_errors: AtomicU64,
    pending_settlements: AtomicI64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Ledger entries created, by category.
    pub entries_created: Vec<(String, u64)>,
    /// Settlements driven to COMPLETED.
    pub settlements_completed: u64,
    /// Settlements refunded (timeout or provider failure).
    pub settlements_refunded: u64,
    /// Reconciliation cycles run.
    pub poller_cycles: u64,
    /// Per-record failures caught inside cycles.
    pub poller_record_failures: u64,
    /// Outbox events dispatched successfully.
    pub outbox_dispatched: u64,
    /// Outbox dispatch failures.
    pub outbox_failures: u64,
    /// Provider transport errors observed.
    pub provider_errors: u64,
    /// Gauge of settlements currently pending.
    pub pending_settlements: i64,
}

impl SettlementMetrics {
    /// Creates a zeroed metrics registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts ledger entries created for a category.
    pub fn entries_created(&self, category: LedgerCategory, count: u64) {
        *self
            .entries_created
            .entry(category.to_string())
            .or_insert(0) += count;
    }

    /// Counts a settlement driven to COMPLETED.
    pub fn settlement_completed(&self) {
        self.settlements_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a refunded settlement.
    pub fn settlement_refunded(&self) {
        self.settlements_refunded.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a reconciliation cycle.
    pub fn poller_cycle(&self) {
        self.poller_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a per-record failure inside a cycle.
    pub fn poller_record_failure(&self) {
        self.poller_record_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a successful outbox dispatch.
    pub fn outbox_dispatched(&self) {
        self.outbox_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a failed outbox dispatch.
    pub fn outbox_failure(&self) {
        self.outbox_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a provider transport error.
    pub fn provider_error(&self) {
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Adjusts the pending-settlements gauge.
    pub fn pending_adjust(&self, delta: i64) {
        if delta != 0 {
            self.pending_settlements.fetch_add(delta, Ordering::Relaxed);
        }
    }

    /// Takes a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut entries_created: Vec<(String, u64)> = self
            .entries_created
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries_created.sort();

        MetricsSnapshot {
            entries_created,
            settlements_completed: self.settlements_completed.load(Ordering::Relaxed),
            settlements_refunded: self.settlements_refunded.load(Ordering::Relaxed),
            poller_cycles: self.poller_cycles.load(Ordering::Relaxed),
            poller_record_failures: self.poller_record_failures.load(Ordering::Relaxed),
            outbox_dispatched: self.outbox_dispatched.load(Ordering::Relaxed),
            outbox_failures: self.outbox_failures.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            pending_settlements: self.pending_settlements.load(Ordering::Relaxed),
        }
    }
}
