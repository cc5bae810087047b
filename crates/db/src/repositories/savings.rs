//! Savings transaction repository.
//!
//! Savings movements are internal pool transfers and settle
//! synchronously; records are created already terminal.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use thiserror::Error;
use uuid::Uuid;

use settla_shared::types::Currency;

use crate::entities::{
    savings_transactions,
    sea_orm_active_enums::{SavingsKind, SettlementStatus},
};

/// Error types for savings operations.
#[derive(Debug, Error)]
pub enum SavingsError {
    /// Savings transaction not found.
    #[error("Savings transaction not found: {0}")]
    NotFound(Uuid),

    /// A savings transaction with this reference already exists.
    #[error("Savings reference already exists: {0}")]
    DuplicateReference(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<SavingsError> for settla_shared::AppError {
    fn from(err: SavingsError) -> Self {
        match err {
            SavingsError::NotFound(_) => Self::NotFound(err.to_string()),
            SavingsError::DuplicateReference(_) => Self::Conflict(err.to_string()),
            SavingsError::Database(inner) => Self::Database(inner.to_string()),
        }
    }
}

/// Input for creating a savings transaction record.
#[derive(Debug, Clone)]
pub struct CreateSavingsTransactionInput {
    /// Trace shared with the ledger postings.
    pub trace_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Deposit, withdrawal, or interest payout.
    pub kind: SavingsKind,
    /// Amount in minor units.
    pub amount_minor_units: i64,
    /// Currency of the amount.
    pub currency: Currency,
    /// Status the record is created with.
    pub status: SettlementStatus,
    /// Unique, externally visible reference.
    pub reference: String,
}

/// Savings transaction repository.
#[derive(Debug, Clone)]
pub struct SavingsRepository {
    db: DatabaseConnection,
}

impl SavingsRepository {
    /// Creates a new savings repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a savings transaction inside the caller's atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `SavingsError::DuplicateReference` if the reference is
    /// already taken.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: CreateSavingsTransactionInput,
    ) -> Result<savings_transactions::Model, SavingsError> {
        let now = Utc::now().into();
        let txn = savings_transactions::ActiveModel {
            id: Set(Uuid::now_v7()),
            trace_id: Set(input.trace_id),
            user_id: Set(input.user_id),
            kind: Set(input.kind),
            amount: Set(input.amount_minor_units),
            currency: Set(input.currency.to_string()),
            status: Set(input.status),
            reference: Set(input.reference.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        txn.insert(conn).await.map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                SavingsError::DuplicateReference(input.reference)
            } else {
                err.into()
            }
        })
    }

    /// Looks a savings transaction up by ID.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<savings_transactions::Model>, SavingsError> {
        Ok(savings_transactions::Entity::find_by_id(id)
            .one(&self.db)
            .await?)
    }

    /// Recent savings transactions for a user.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<savings_transactions::Model>, SavingsError> {
        Ok(savings_transactions::Entity::find()
            .filter(savings_transactions::Column::UserId.eq(user_id))
            .order_by_desc(savings_transactions::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}
