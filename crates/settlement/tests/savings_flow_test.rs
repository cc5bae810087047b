//! Savings settlement tests: synchronous internal double entries.

mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;

use common::{config, setup};
use settla_core::settlement::SettlementStatus;
use settla_db::entities::sea_orm_active_enums as db_enums;
use settla_db::repositories::LedgerRepository;
use settla_settlement::{SavingsRequest, SavingsService, SettlementMetrics};
use settla_shared::AppError;
use settla_shared::types::{Currency, UserId};

fn savings_request(key: &str, amount: rust_decimal::Decimal) -> SavingsRequest {
    SavingsRequest {
        idempotency_key: key.to_string(),
        amount,
        currency: Currency::Ngn,
    }
}

#[tokio::test]
async fn test_deposit_settles_synchronously() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = SavingsService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let saver = UserId::new();
    let deposited = service
        .deposit(saver, savings_request("K1", dec!(200.00)))
        .await
        .expect("deposit");

    assert_eq!(deposited.status, SettlementStatus::Completed);
    assert_eq!(deposited.amount_minor_units, 20_000);
    assert_eq!(deposited.kind, db_enums::SavingsKind::Deposit);

    let entries = ledger
        .get_by_trace_id(deposited.trace_id)
        .await
        .expect("entries");
    assert_eq!(entries.len(), 2);
    assert!(
        entries
            .iter()
            .all(|entry| entry.status == db_enums::EntryStatus::Completed)
    );
    let debit = entries
        .iter()
        .find(|entry| entry.entry_type == db_enums::EntryType::Debit)
        .expect("debit");
    assert_eq!(debit.account, format!("user_wallet:{saver}"));
    let credit = entries
        .iter()
        .find(|entry| entry.entry_type == db_enums::EntryType::Credit)
        .expect("credit");
    assert_eq!(credit.account, "savings_pool");

    let findings = ledger
        .find_inconsistencies(chrono::Duration::seconds(3600))
        .await
        .expect("audit");
    assert!(findings.is_empty());
}

#[tokio::test]
async fn test_withdraw_moves_pool_back_to_wallet() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = SavingsService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let saver = UserId::new();
    service
        .deposit(saver, savings_request("K1", dec!(200.00)))
        .await
        .expect("deposit");
    let withdrawn = service
        .withdraw(saver, savings_request("K2", dec!(50.00)))
        .await
        .expect("withdraw");

    assert_eq!(withdrawn.kind, db_enums::SavingsKind::Withdrawal);
    let entries = ledger
        .get_by_trace_id(withdrawn.trace_id)
        .await
        .expect("entries");
    let debit = entries
        .iter()
        .find(|entry| entry.entry_type == db_enums::EntryType::Debit)
        .expect("debit");
    assert_eq!(debit.account, "savings_pool");
    let credit = entries
        .iter()
        .find(|entry| entry.entry_type == db_enums::EntryType::Credit)
        .expect("credit");
    assert_eq!(credit.account, format!("user_wallet:{saver}"));
}

#[tokio::test]
async fn test_interest_settles_from_interest_pool() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = SavingsService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let saver = UserId::new();
    let interest = service
        .settle_interest(saver, savings_request("ACCRUAL-2026-08", dec!(3.25)))
        .await
        .expect("interest");

    assert_eq!(interest.kind, db_enums::SavingsKind::Interest);
    assert_eq!(interest.amount_minor_units, 325);

    let entries = ledger
        .get_by_trace_id(interest.trace_id)
        .await
        .expect("entries");
    let debit = entries
        .iter()
        .find(|entry| entry.entry_type == db_enums::EntryType::Debit)
        .expect("debit");
    assert_eq!(debit.account, "interest_pool");
    let credit = entries
        .iter()
        .find(|entry| entry.entry_type == db_enums::EntryType::Credit)
        .expect("credit");
    assert_eq!(credit.account, "savings_pool");
}

#[tokio::test]
async fn test_deposit_is_idempotent() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = SavingsService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let saver = UserId::new();
    let first = service
        .deposit(saver, savings_request("K1", dec!(200.00)))
        .await
        .expect("first");
    let second = service
        .deposit(saver, savings_request("K1", dec!(200.00)))
        .await
        .expect("replay");

    assert_eq!(first, second);
    let entries = ledger
        .get_by_trace_id(first.trace_id)
        .await
        .expect("entries");
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_deposit_rejects_invalid_amount() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = SavingsService::new(db, config(), metrics);

    let err = service
        .deposit(UserId::new(), savings_request("K1", dec!(0)))
        .await
        .expect_err("zero amount");
    assert!(matches!(err, AppError::InvalidAmount(_)));
}

#[tokio::test]
async fn test_get_enforces_ownership() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = SavingsService::new(db, config(), metrics);

    let saver = UserId::new();
    let deposited = service
        .deposit(saver, savings_request("K1", dec!(200.00)))
        .await
        .expect("deposit");

    assert!(
        service
            .get(saver, deposited.savings_transaction_id)
            .await
            .is_ok()
    );
    let err = service
        .get(UserId::new(), deposited.savings_transaction_id)
        .await
        .expect_err("stranger read");
    assert!(matches!(err, AppError::Unauthorized(_)));
}
