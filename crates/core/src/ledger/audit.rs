//! Ledger inconsistency audit.
//!
//! Pure conservation-of-value checks over a set of ledger entries.
//! The audit reports problems; it never repairs them. Repair is a
//! deliberate, separately-authorized admin action.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::entry::{EntryStatus, EntryType, LedgerCategory};

/// A ledger entry as seen by the audit.
#[derive(Debug, Clone)]
pub struct EntryRecord {
    /// Entry ID.
    pub id: Uuid,
    /// Trace the entry belongs to.
    pub trace_id: Uuid,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Business category.
    pub category: LedgerCategory,
    /// Amount in minor units.
    pub amount_minor_units: i64,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Counterpart entry, if any.
    pub related_to: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// The kind of inconsistency found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InconsistencyKind {
    /// Settled entries of a trace do not sum to zero.
    UnbalancedTrace {
        /// Net signed amount (debits positive).
        net_minor_units: i64,
    },
    /// An entry has been pending beyond the staleness threshold.
    StalePending {
        /// The stale entry.
        entry_id: Uuid,
        /// How long it has been pending, in seconds.
        pending_secs: i64,
    },
    /// A failed entry has neither a completed refund covering it nor a
    /// failed counterpart it cancels against.
    MissingRefund {
        /// The uncovered failed entry.
        entry_id: Uuid,
    },
}

impl std::fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnbalancedTrace { net_minor_units } => {
                write!(f, "settled entries sum to {net_minor_units}, expected 0")
            }
            Self::StalePending {
                entry_id,
                pending_secs,
            } => write!(f, "entry {entry_id} pending for {pending_secs}s"),
            Self::MissingRefund { entry_id } => {
                write!(f, "failed entry {entry_id} has no compensating refund")
            }
        }
    }
}

/// A single audit finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    /// The trace the finding belongs to.
    pub trace_id: Uuid,
    /// What is wrong.
    pub kind: InconsistencyKind,
}

impl Inconsistency {
    /// Human-readable reason string.
    #[must_use]
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }
}

/// Audits a set of ledger entries for conservation violations.
///
/// Per trace:
/// - entries pending longer than `stale_after` are reported stale;
/// - once no entry is pending, the signed amounts of settled entries must
///   sum to zero. A completed refund credit cancels against the failed
///   entry it references; a failed debit/credit pair cancels against
///   itself. Any failed entry covered by neither is reported.
///
/// The audit is read-only and idempotent: running it twice over the same
/// entries yields the same findings.
#[must_use]
pub fn audit_entries(
    entries: &[EntryRecord],
    stale_after: Duration,
    now: DateTime<Utc>,
) -> Vec<Inconsistency> {
    let mut traces: BTreeMap<Uuid, Vec<&EntryRecord>> = BTreeMap::new();
    for entry in entries {
        traces.entry(entry.trace_id).or_default().push(entry);
    }

    let mut findings = Vec::new();

    for (trace_id, trace_entries) in traces {
        let mut has_pending = false;

        for entry in &trace_entries {
            if entry.status == EntryStatus::Pending {
                has_pending = true;
                let pending_for = now - entry.created_at;
                if pending_for > stale_after {
                    findings.push(Inconsistency {
                        trace_id,
                        kind: InconsistencyKind::StalePending {
                            entry_id: entry.id,
                            pending_secs: pending_for.num_seconds(),
                        },
                    });
                }
            }
        }

        // Balance and refund coverage only apply once the trace has fully
        // settled; a half-settled trace is in flight, not inconsistent.
        if has_pending {
            continue;
        }

        let by_id: HashMap<Uuid, &EntryRecord> = trace_entries
            .iter()
            .map(|entry| (entry.id, *entry))
            .collect();

        // Failed entries referenced by a completed refund are "refunded":
        // the money went out and came back, so both legs count.
        let refunded: HashSet<Uuid> = trace_entries
            .iter()
            .filter(|entry| {
                entry.status == EntryStatus::Completed
                    && entry.category == LedgerCategory::Refund
            })
            .filter_map(|entry| entry.related_to)
            .collect();

        let mut net: i64 = 0;
        for entry in &trace_entries {
            match entry.status {
                EntryStatus::Completed => {
                    net += entry.entry_type.signed(entry.amount_minor_units);
                }
                EntryStatus::Failed => {
                    if refunded.contains(&entry.id) {
                        net += entry.entry_type.signed(entry.amount_minor_units);
                    } else {
                        // A failed pair (both legs failed together) cancels
                        // itself and needs no refund.
                        let pair_failed = entry
                            .related_to
                            .and_then(|counterpart| by_id.get(&counterpart))
                            .is_some_and(|counterpart| {
                                counterpart.status == EntryStatus::Failed
                            });
                        if !pair_failed {
                            findings.push(Inconsistency {
                                trace_id,
                                kind: InconsistencyKind::MissingRefund { entry_id: entry.id },
                            });
                        }
                    }
                }
                // Pending traces were skipped above.
                EntryStatus::Pending => {}
            }
        }

        if net != 0 {
            findings.push(Inconsistency {
                trace_id,
                kind: InconsistencyKind::UnbalancedTrace {
                    net_minor_units: net,
                },
            });
        }
    }

    findings
}
