//! `SeaORM` entity definitions.

pub mod bill_payments;
pub mod idempotency_records;
pub mod ledger_entries;
pub mod loan_applications;
pub mod outbox_events;
pub mod savings_transactions;
pub mod sea_orm_active_enums;
pub mod transfers;
