//! Loan application and disbursement tests.

mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;

use common::{config, setup};
use settla_db::entities::sea_orm_active_enums as db_enums;
use settla_db::repositories::LedgerRepository;
use settla_settlement::{ApplyLoanRequest, LoanService, SettlementMetrics};
use settla_shared::AppError;
use settla_shared::types::{Currency, UserId};

fn loan_request(key: &str) -> ApplyLoanRequest {
    ApplyLoanRequest {
        idempotency_key: key.to_string(),
        principal: dec!(1000.00),
        currency: Currency::Ngn,
    }
}

#[tokio::test]
async fn test_apply_records_application_without_money_movement() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = LoanService::new(db.clone(), config(), metrics);

    let borrower = UserId::new();
    let applied = service
        .apply(borrower, loan_request("K1"))
        .await
        .expect("apply");

    assert_eq!(applied.status, db_enums::LoanStatus::Applied);
    assert_eq!(applied.principal_minor_units, 100_000);
    assert!(applied.trace_id.is_none());
}

#[tokio::test]
async fn test_disburse_moves_principal_into_wallet() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = LoanService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let borrower = UserId::new();
    let applied = service
        .apply(borrower, loan_request("K1"))
        .await
        .expect("apply");
    service.approve(applied.application_id).await.expect("approve");

    let disbursed = service
        .disburse(borrower, applied.application_id, "K1-disburse")
        .await
        .expect("disburse");

    assert_eq!(disbursed.status, db_enums::LoanStatus::Disbursed);
    let trace_id = disbursed.trace_id.expect("disbursement trace");

    let entries = ledger.get_by_trace_id(trace_id).await.expect("entries");
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
    assert_eq!(debit.account, "loan_pool");
    let credit = entries
        .iter()
        .find(|entry| entry.entry_type == db_enums::EntryType::Credit)
        .expect("credit");
    assert_eq!(credit.account, format!("user_wallet:{borrower}"));
    assert_eq!(credit.amount, 100_000);

    let findings = ledger
        .find_inconsistencies(chrono::Duration::seconds(3600))
        .await
        .expect("audit");
    assert!(findings.is_empty());
}

#[tokio::test]
async fn test_disburse_is_idempotent() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = LoanService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let borrower = UserId::new();
    let applied = service
        .apply(borrower, loan_request("K1"))
        .await
        .expect("apply");
    service.approve(applied.application_id).await.expect("approve");

    let first = service
        .disburse(borrower, applied.application_id, "K1-disburse")
        .await
        .expect("first");
    let second = service
        .disburse(borrower, applied.application_id, "K1-disburse")
        .await
        .expect("replay");

    assert_eq!(first, second);
    let entries = ledger
        .get_by_trace_id(first.trace_id.expect("trace"))
        .await
        .expect("entries");
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_disburse_requires_ownership() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = LoanService::new(db, config(), metrics);

    let borrower = UserId::new();
    let applied = service
        .apply(borrower, loan_request("K1"))
        .await
        .expect("apply");
    service.approve(applied.application_id).await.expect("approve");

    let err = service
        .disburse(UserId::new(), applied.application_id, "K2")
        .await
        .expect_err("stranger disbursement");
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_disburse_requires_approval() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = LoanService::new(db, config(), metrics);

    let borrower = UserId::new();
    let applied = service
        .apply(borrower, loan_request("K1"))
        .await
        .expect("apply");

    let err = service
        .disburse(borrower, applied.application_id, "K2")
        .await
        .expect_err("unapproved disbursement");
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_approve_is_single_shot() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = LoanService::new(db, config(), metrics);

    let applied = service
        .apply(UserId::new(), loan_request("K1"))
        .await
        .expect("apply");

    service.approve(applied.application_id).await.expect("approve");
    let err = service
        .approve(applied.application_id)
        .await
        .expect_err("second approval");
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}
