//! Integration tests for the ledger repository.
//!
//! Runs the real migrations against an in-memory SQLite database; the
//! schema builder keeps the migration portable between Postgres and
//! SQLite.

use chrono::Duration;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, TransactionTrait};
use uuid::Uuid;

use settla_core::ledger::{
    Account, EntryStatus, EntryType, InconsistencyKind, LedgerCategory, LedgerError,
};
use settla_db::migration::{Migrator, MigratorTrait};
use settla_db::repositories::ledger::{CreateEntryInput, DoubleEntryInput, LedgerRepository};
use settla_shared::types::{Currency, UserId};

async fn setup() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1);
    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

fn double_entry(trace_id: Uuid, amount: i64, status: EntryStatus) -> DoubleEntryInput {
    DoubleEntryInput {
        trace_id,
        from_account: Account::UserWallet(UserId::new()),
        to_account: Account::SavingsPool,
        amount_minor_units: amount,
        category: LedgerCategory::Savings,
        currency: Currency::Ngn,
        user_id: None,
        subtype: None,
        status,
        meta: serde_json::Value::Null,
    }
}

#[tokio::test]
async fn test_create_entry_persists_pending_posting() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let trace_id = Uuid::now_v7();
    let user = UserId::new();

    let entry = repo
        .create_entry(
            &db,
            CreateEntryInput::pending(
                trace_id,
                Some(user.into_inner()),
                Account::UserWallet(user),
                EntryType::Debit,
                LedgerCategory::Transfer,
                50_000,
                Currency::Ngn,
            ),
        )
        .await
        .expect("create entry");

    assert_eq!(entry.trace_id, trace_id);
    assert_eq!(entry.amount, 50_000);
    assert!(entry.processed_at.is_none());

    let entries = repo.get_by_trace_id(trace_id).await.expect("get by trace");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].account, format!("user_wallet:{user}"));
}

#[tokio::test]
async fn test_create_entry_rejects_non_positive_amount() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let mut input = CreateEntryInput::pending(
        Uuid::now_v7(),
        None,
        Account::PlatformRevenue,
        EntryType::Credit,
        LedgerCategory::Fee,
        0,
        Currency::Ngn,
    );

    let err = repo
        .create_entry(&db, input.clone())
        .await
        .expect_err("zero amount must be rejected");
    assert!(matches!(err, LedgerError::InvalidAmount(0)));

    input.amount_minor_units = -100;
    let err = repo
        .create_entry(&db, input)
        .await
        .expect_err("negative amount must be rejected");
    assert!(matches!(err, LedgerError::InvalidAmount(-100)));
}

#[tokio::test]
async fn test_double_entry_links_both_legs() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let trace_id = Uuid::now_v7();

    let (debit, credit) = repo
        .create_double_entry(
            &db,
            double_entry(trace_id, 25_000, EntryStatus::Completed),
        )
        .await
        .expect("create double entry");

    assert_eq!(debit.amount, credit.amount);
    assert_eq!(debit.trace_id, credit.trace_id);
    assert_eq!(debit.related_to, Some(credit.id));
    assert_eq!(credit.related_to, Some(debit.id));
    assert!(debit.processed_at.is_some());

    let findings = repo
        .find_inconsistencies(Duration::seconds(3600))
        .await
        .expect("audit");
    assert!(findings.is_empty());
}

#[tokio::test]
async fn test_double_entry_rejects_same_account() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let mut input = double_entry(Uuid::now_v7(), 1_000, EntryStatus::Pending);
    input.from_account = Account::SavingsPool;
    input.to_account = Account::SavingsPool;

    let err = repo
        .create_double_entry(&db, input)
        .await
        .expect_err("same account must be rejected");
    assert!(matches!(err, LedgerError::SameAccount(_)));
}

#[tokio::test]
async fn test_double_entry_never_persists_one_leg_on_abort() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let trace_id = Uuid::now_v7();

    let txn = db.begin().await.expect("begin");
    repo.create_double_entry(&txn, double_entry(trace_id, 10_000, EntryStatus::Pending))
        .await
        .expect("create double entry inside txn");
    // Simulated crash before commit.
    txn.rollback().await.expect("rollback");

    let entries = repo.get_by_trace_id(trace_id).await.expect("get by trace");
    assert!(
        entries.is_empty(),
        "aborted transaction must leave no posting behind"
    );
}

#[tokio::test]
async fn test_update_status_completes_pending_entry() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let trace_id = Uuid::now_v7();

    let (debit, _credit) = repo
        .create_double_entry(
            &db,
            double_entry(trace_id, 5_000, EntryStatus::Pending),
        )
        .await
        .expect("create double entry");

    let updated = repo
        .update_status(&db, debit.id, EntryStatus::Completed)
        .await
        .expect("complete entry");
    assert!(updated.processed_at.is_some());

    // Terminal entries never move again.
    let err = repo
        .update_status(&db, debit.id, EntryStatus::Failed)
        .await
        .expect_err("terminal entry must not transition");
    assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_update_status_by_trace_completes_all_pending() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let trace_id = Uuid::now_v7();

    repo.create_double_entry(
        &db,
        double_entry(trace_id, 5_000, EntryStatus::Pending),
    )
    .await
    .expect("create double entry");

    let moved = repo
        .update_status_by_trace(&db, trace_id, EntryStatus::Completed)
        .await
        .expect("complete trace");
    assert_eq!(moved, 2);

    let entries = repo.get_by_trace_id(trace_id).await.expect("get by trace");
    assert!(entries.iter().all(|entry| entry.processed_at.is_some()));

    let err = repo
        .update_status_by_trace(&db, trace_id, EntryStatus::Failed)
        .await
        .expect_err("settled trace must not transition again");
    assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_update_status_by_trace_unknown_trace() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let err = repo
        .update_status_by_trace(&db, Uuid::now_v7(), EntryStatus::Completed)
        .await
        .expect_err("unknown trace");
    assert!(matches!(err, LedgerError::TraceNotFound(_)));
}

#[tokio::test]
async fn test_find_inconsistencies_flags_lone_completed_leg() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let trace_id = Uuid::now_v7();

    let mut input = CreateEntryInput::pending(
        trace_id,
        None,
        Account::PlatformRevenue,
        EntryType::Credit,
        LedgerCategory::Transfer,
        50_000,
        Currency::Ngn,
    );
    input.status = EntryStatus::Completed;
    repo.create_entry(&db, input)
        .await
        .expect("create lone credit");

    let findings = repo
        .find_inconsistencies(Duration::seconds(3600))
        .await
        .expect("audit");
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].trace_id, trace_id);
    assert_eq!(
        findings[0].kind,
        InconsistencyKind::UnbalancedTrace {
            net_minor_units: -50_000
        }
    );
}

#[tokio::test]
async fn test_list_for_user_filters_by_category() {
    let db = setup().await;
    let repo = LedgerRepository::new(db.clone());
    let user = UserId::new();

    for category in [LedgerCategory::Transfer, LedgerCategory::Savings] {
        repo.create_entry(
            &db,
            CreateEntryInput::pending(
                Uuid::now_v7(),
                Some(user.into_inner()),
                Account::UserWallet(user),
                EntryType::Debit,
                category,
                1_000,
                Currency::Ngn,
            ),
        )
        .await
        .expect("create entry");
    }

    let all = repo
        .list_for_user(user.into_inner(), None, 10)
        .await
        .expect("list all");
    assert_eq!(all.len(), 2);

    let transfers = repo
        .list_for_user(user.into_inner(), Some(LedgerCategory::Transfer), 10)
        .await
        .expect("list transfers");
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].category, "transfer");
}
