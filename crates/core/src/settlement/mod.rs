//! Settlement state machine and reconciliation decisions.
//!
//! A settlement record moves `Pending -> {Completed, Failed}`; the
//! transient `Processing` state is a claim marker so concurrent pollers
//! never double-settle the same record.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderOutcome;

/// Lifecycle status of a domain settlement record (transfer, bill
/// payment, savings transaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettlementStatus {
    /// Awaiting provider confirmation or internal completion.
    Pending,
    /// Claimed by a reconciliation worker; provider I/O in flight.
    Processing,
    /// Settled; ledger postings completed.
    Completed,
    /// Terminally failed; compensating refund posted.
    Failed,
}

impl SettlementStatus {
    /// Returns true if the record can no longer change status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Why a settlement is being refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundReason {
    /// The record aged past the configured refund timeout.
    Timeout,
    /// The provider reported a terminal failure.
    ProviderFailed,
}

/// What the reconciliation worker should do with a pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Post the paired credit and complete the trace.
    Complete,
    /// Post the compensating refund and fail the record.
    Refund(RefundReason),
    /// Leave the record pending for the next cycle.
    Wait,
}

/// Decides the next step for one pending settlement record.
///
/// The timeout check comes first: a record past the refund timeout is
/// refunded without querying the provider. Otherwise the provider's
/// answer (if one was obtainable) drives the outcome.
#[must_use]
pub fn reconcile_action(
    age: Duration,
    refund_timeout: Duration,
    provider_outcome: Option<ProviderOutcome>,
) -> ReconcileAction {
    if age > refund_timeout {
        return ReconcileAction::Refund(RefundReason::Timeout);
    }
    match provider_outcome {
        Some(ProviderOutcome::Settled) => ReconcileAction::Complete,
        Some(ProviderOutcome::Failed) => ReconcileAction::Refund(RefundReason::ProviderFailed),
        Some(ProviderOutcome::Pending) | None => ReconcileAction::Wait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const TIMEOUT: i64 = 86400;

    #[rstest]
    #[case(100, Some(ProviderOutcome::Settled), ReconcileAction::Complete)]
    #[case(
        100,
        Some(ProviderOutcome::Failed),
        ReconcileAction::Refund(RefundReason::ProviderFailed)
    )]
    #[case(100, Some(ProviderOutcome::Pending), ReconcileAction::Wait)]
    #[case(100, None, ReconcileAction::Wait)]
    #[case(
        TIMEOUT + 1,
        None,
        ReconcileAction::Refund(RefundReason::Timeout)
    )]
    #[case(
        TIMEOUT + 1,
        Some(ProviderOutcome::Settled),
        ReconcileAction::Refund(RefundReason::Timeout)
    )]
    fn test_reconcile_action(
        #[case] age_secs: i64,
        #[case] outcome: Option<ProviderOutcome>,
        #[case] expected: ReconcileAction,
    ) {
        let action = reconcile_action(
            Duration::seconds(age_secs),
            Duration::seconds(TIMEOUT),
            outcome,
        );
        assert_eq!(action, expected);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!SettlementStatus::Pending.is_terminal());
        assert!(!SettlementStatus::Processing.is_terminal());
        assert!(SettlementStatus::Completed.is_terminal());
        assert!(SettlementStatus::Failed.is_terminal());
    }

    proptest! {
        /// Past the timeout, the decision is always a timeout refund,
        /// whatever the provider says.
        #[test]
        fn prop_timeout_always_refunds(
            extra_secs in 1i64..1_000_000i64,
            outcome_idx in 0usize..4usize,
        ) {
            let outcome = [
                None,
                Some(ProviderOutcome::Settled),
                Some(ProviderOutcome::Failed),
                Some(ProviderOutcome::Pending),
            ][outcome_idx];
            let action = reconcile_action(
                Duration::seconds(TIMEOUT + extra_secs),
                Duration::seconds(TIMEOUT),
                outcome,
            );
            prop_assert_eq!(action, ReconcileAction::Refund(RefundReason::Timeout));
        }

        /// Within the timeout, the worker never refunds without a
        /// terminal provider failure.
        #[test]
        fn prop_no_premature_timeout_refund(age_secs in 0i64..TIMEOUT) {
            for outcome in [None, Some(ProviderOutcome::Pending)] {
                let action = reconcile_action(
                    Duration::seconds(age_secs),
                    Duration::seconds(TIMEOUT),
                    outcome,
                );
                prop_assert_eq!(action, ReconcileAction::Wait);
            }
        }
    }
}
