//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access
//! - Database migrations
//!
//! Repositories expose the transactional methods orchestrators compose
//! into one atomic unit: domain record + ledger postings + outbox intent
//! are all visible, or none are.

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{
    BillPaymentRepository, IdempotencyRepository, LedgerRepository, LoanRepository,
    OutboxRepository, SavingsRepository, TransferRepository,
};

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}
