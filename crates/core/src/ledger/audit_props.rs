//! Property tests for the ledger audit.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use super::audit::{EntryRecord, InconsistencyKind, audit_entries};
use super::entry::{EntryStatus, EntryType, LedgerCategory};

fn amount_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000i64
}

fn category_strategy() -> impl Strategy<Value = LedgerCategory> {
    prop_oneof![
        Just(LedgerCategory::BillPayment),
        Just(LedgerCategory::Transfer),
        Just(LedgerCategory::Loan),
        Just(LedgerCategory::Savings),
        Just(LedgerCategory::Fee),
        Just(LedgerCategory::Settlement),
        Just(LedgerCategory::Escrow),
    ]
}

fn completed_pair(trace_id: Uuid, category: LedgerCategory, amount: i64) -> Vec<EntryRecord> {
    let now = Utc::now();
    let debit_id = Uuid::now_v7();
    let credit_id = Uuid::now_v7();
    vec![
        EntryRecord {
            id: debit_id,
            trace_id,
            entry_type: EntryType::Debit,
            category,
            amount_minor_units: amount,
            status: EntryStatus::Completed,
            related_to: Some(credit_id),
            created_at: now,
        },
        EntryRecord {
            id: credit_id,
            trace_id,
            entry_type: EntryType::Credit,
            category,
            amount_minor_units: amount,
            status: EntryStatus::Completed,
            related_to: Some(debit_id),
            created_at: now,
        },
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Balanced completed double entries never produce findings,
    /// regardless of how many traces or what amounts.
    #[test]
    fn prop_balanced_pairs_are_clean(
        specs in prop::collection::vec((category_strategy(), amount_strategy()), 1..10),
    ) {
        let mut entries = Vec::new();
        for (category, amount) in specs {
            entries.extend(completed_pair(Uuid::now_v7(), category, amount));
        }
        let findings = audit_entries(&entries, Duration::seconds(3600), Utc::now());
        prop_assert!(findings.is_empty());
    }

    /// A lone settled entry is always flagged as unbalanced with the
    /// entry's own signed amount.
    #[test]
    fn prop_single_leg_is_unbalanced(
        amount in amount_strategy(),
        is_debit in any::<bool>(),
        category in category_strategy(),
    ) {
        let trace_id = Uuid::now_v7();
        let entry_type = if is_debit { EntryType::Debit } else { EntryType::Credit };
        let entries = vec![EntryRecord {
            id: Uuid::now_v7(),
            trace_id,
            entry_type,
            category,
            amount_minor_units: amount,
            status: EntryStatus::Completed,
            related_to: None,
            created_at: Utc::now(),
        }];
        let findings = audit_entries(&entries, Duration::seconds(3600), Utc::now());
        prop_assert_eq!(findings.len(), 1);
        prop_assert_eq!(
            &findings[0].kind,
            &InconsistencyKind::UnbalancedTrace { net_minor_units: entry_type.signed(amount) }
        );
    }

    /// Fresh pending entries are never reported.
    #[test]
    fn prop_fresh_pending_is_clean(
        amount in amount_strategy(),
        category in category_strategy(),
        age_secs in 0i64..3600i64,
    ) {
        let entries = vec![EntryRecord {
            id: Uuid::now_v7(),
            trace_id: Uuid::now_v7(),
            entry_type: EntryType::Debit,
            category,
            amount_minor_units: amount,
            status: EntryStatus::Pending,
            related_to: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }];
        let findings = audit_entries(&entries, Duration::seconds(3600), Utc::now());
        prop_assert!(findings.is_empty());
    }

    /// A failed entry fully covered by a completed refund is clean.
    #[test]
    fn prop_refunded_failure_is_clean(amount in amount_strategy()) {
        let trace_id = Uuid::now_v7();
        let failed_id = Uuid::now_v7();
        let now = Utc::now();
        let entries = vec![
            EntryRecord {
                id: failed_id,
                trace_id,
                entry_type: EntryType::Debit,
                category: LedgerCategory::Transfer,
                amount_minor_units: amount,
                status: EntryStatus::Failed,
                related_to: None,
                created_at: now,
            },
            EntryRecord {
                id: Uuid::now_v7(),
                trace_id,
                entry_type: EntryType::Credit,
                category: LedgerCategory::Refund,
                amount_minor_units: amount,
                status: EntryStatus::Completed,
                related_to: Some(failed_id),
                created_at: now,
            },
        ];
        let findings = audit_entries(&entries, Duration::seconds(3600), Utc::now());
        prop_assert!(findings.is_empty());
    }
}
