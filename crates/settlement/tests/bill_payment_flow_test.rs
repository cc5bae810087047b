//! End-to-end bill payment settlement tests.

mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;

use common::{MockGateway, config, instant_timeout_config, receipt, setup};
use settla_core::settlement::SettlementStatus;
use settla_db::entities::sea_orm_active_enums as db_enums;
use settla_db::repositories::{BillPaymentRepository, LedgerRepository, OutboxRepository};
use settla_settlement::{
    BillPaymentService, OutboxDispatcher, PayBillRequest, ReconciliationWorker, SettlementMetrics,
};
use settla_shared::AppError;
use settla_shared::types::{Currency, UserId};

fn bill_request(key: &str) -> PayBillRequest {
    PayBillRequest {
        idempotency_key: key.to_string(),
        biller: "dstv".to_string(),
        customer_ref: "1234567890".to_string(),
        amount: dec!(150.00),
        fee: Some(dec!(1.00)),
        currency: Currency::Ngn,
    }
}

#[tokio::test]
async fn test_pay_posts_debit_fee_pair_and_outbox_intent() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = BillPaymentService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());
    let outbox = OutboxRepository::new(db.clone());

    let payer = UserId::new();
    let paid = service.pay(payer, bill_request("K1")).await.expect("pay bill");

    assert_eq!(paid.status, SettlementStatus::Pending);
    assert_eq!(paid.amount_minor_units, 15_000);
    assert_eq!(paid.fee_minor_units, 100);

    let entries = ledger.get_by_trace_id(paid.trace_id).await.expect("entries");
    assert_eq!(entries.len(), 3);
    assert!(
        entries
            .iter()
            .all(|entry| entry.status == db_enums::EntryStatus::Pending)
    );
    let bill_debit = entries
        .iter()
        .find(|entry| entry.category == "bill-payment")
        .expect("bill debit");
    assert_eq!(bill_debit.amount, 15_000);
    assert_eq!(bill_debit.subtype.as_deref(), Some("dstv"));
    let fee_legs: Vec<_> = entries
        .iter()
        .filter(|entry| entry.category == "fee")
        .collect();
    assert_eq!(fee_legs.len(), 2);
    assert!(fee_legs.iter().all(|entry| entry.amount == 100));

    let events = outbox.fetch_unprocessed(10).await.expect("outbox");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, "bill-payment.initiate");
}

#[tokio::test]
async fn test_pay_is_idempotent() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = BillPaymentService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let payer = UserId::new();
    let first = service.pay(payer, bill_request("K1")).await.expect("first");
    let second = service.pay(payer, bill_request("K1")).await.expect("replay");

    assert_eq!(first, second);
    let entries = ledger.get_by_trace_id(first.trace_id).await.expect("entries");
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn test_pay_without_fee_posts_single_debit() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = BillPaymentService::new(db.clone(), config(), metrics);
    let ledger = LedgerRepository::new(db.clone());

    let mut request = bill_request("K1");
    request.fee = None;
    let paid = service.pay(UserId::new(), request).await.expect("pay bill");

    assert_eq!(paid.fee_minor_units, 0);
    let entries = ledger.get_by_trace_id(paid.trace_id).await.expect("entries");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_completion_settles_bill_and_fee() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = BillPaymentService::new(db.clone(), config(), metrics.clone());
    let ledger = LedgerRepository::new(db.clone());
    let bills = BillPaymentRepository::new(db.clone());

    let paid = service
        .pay(UserId::new(), bill_request("K1"))
        .await
        .expect("pay bill");

    let mut gateway = MockGateway::new();
    gateway
        .expect_transfer()
        .times(1)
        .returning(|_| Ok(receipt("09", Some("TXN9"))));
    gateway
        .expect_query_transfer()
        .times(1)
        .returning(|_| Ok(receipt("00", Some("TXN9"))));
    let gateway: Arc<MockGateway> = Arc::new(gateway);

    OutboxDispatcher::new(db.clone(), gateway.clone(), config(), metrics.clone())
        .run_cycle()
        .await
        .expect("dispatch");

    let stats = ReconciliationWorker::new(db.clone(), gateway, config(), metrics)
        .run_cycle()
        .await
        .expect("reconcile");
    assert_eq!(stats.completed, 1);

    let entries = ledger.get_by_trace_id(paid.trace_id).await.expect("entries");
    assert_eq!(entries.len(), 4);
    assert!(
        entries
            .iter()
            .all(|entry| entry.status == db_enums::EntryStatus::Completed)
    );
    let provider_credit = entries
        .iter()
        .find(|entry| entry.account == "provider:dstv")
        .expect("provider credit");
    assert_eq!(provider_credit.amount, 15_000);

    let findings = ledger
        .find_inconsistencies(chrono::Duration::seconds(3600))
        .await
        .expect("audit");
    assert!(findings.is_empty());

    let record = bills
        .find_by_id(paid.bill_payment_id)
        .await
        .expect("find")
        .expect("record");
    assert_eq!(record.status, db_enums::SettlementStatus::Completed);
}

#[tokio::test]
async fn test_timeout_refunds_bill_amount_and_cancels_fee() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = BillPaymentService::new(db.clone(), config(), metrics.clone());
    let ledger = LedgerRepository::new(db.clone());
    let bills = BillPaymentRepository::new(db.clone());

    let payer = UserId::new();
    let paid = service.pay(payer, bill_request("K1")).await.expect("pay bill");

    let stats = ReconciliationWorker::new(
        db.clone(),
        Arc::new(MockGateway::new()),
        instant_timeout_config(),
        metrics,
    )
    .run_cycle()
    .await
    .expect("reconcile");
    assert_eq!(stats.refunded, 1);

    let entries = ledger.get_by_trace_id(paid.trace_id).await.expect("entries");
    // Bill debit + fee pair failed, plus one completed refund credit.
    assert_eq!(entries.len(), 4);
    let refund = entries
        .iter()
        .find(|entry| entry.category == "refund")
        .expect("refund leg");
    assert_eq!(refund.amount, 15_000);
    assert_eq!(refund.status, db_enums::EntryStatus::Completed);
    assert_eq!(refund.account, format!("user_wallet:{payer}"));
    let fee_legs: Vec<_> = entries
        .iter()
        .filter(|entry| entry.category == "fee")
        .collect();
    assert!(
        fee_legs
            .iter()
            .all(|entry| entry.status == db_enums::EntryStatus::Failed)
    );

    // The failed fee pair cancels itself; the books still balance.
    let findings = ledger
        .find_inconsistencies(chrono::Duration::seconds(3600))
        .await
        .expect("audit");
    assert!(findings.is_empty());

    let record = bills
        .find_by_id(paid.bill_payment_id)
        .await
        .expect("find")
        .expect("record");
    assert_eq!(record.status, db_enums::SettlementStatus::Failed);
}

#[tokio::test]
async fn test_get_enforces_ownership() {
    let db = setup().await;
    let metrics = Arc::new(SettlementMetrics::new());
    let service = BillPaymentService::new(db, config(), metrics);

    let payer = UserId::new();
    let paid = service.pay(payer, bill_request("K1")).await.expect("pay bill");

    assert!(service.get(payer, paid.bill_payment_id).await.is_ok());
    let err = service
        .get(UserId::new(), paid.bill_payment_id)
        .await
        .expect_err("stranger read");
    assert!(matches!(err, AppError::Unauthorized(_)));
}
