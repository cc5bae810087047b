//! Transfer repository for domain settlement records.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    sea_query::Expr,
};
use thiserror::Error;
use uuid::Uuid;

use settla_core::provider::TransferKind;
use settla_shared::types::Currency;

use crate::entities::{sea_orm_active_enums::SettlementStatus, transfers};

/// Error types for transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Transfer not found.
    #[error("Transfer not found: {0}")]
    NotFound(Uuid),

    /// A transfer with this reference already exists.
    ///
    /// Surfaces the accepted at-least-once window: a retry after a crash
    /// between commit and the idempotency save hits this instead of
    /// double-posting.
    #[error("Transfer reference already exists: {0}")]
    DuplicateReference(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<TransferError> for settla_shared::AppError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::NotFound(_) => Self::NotFound(err.to_string()),
            TransferError::DuplicateReference(_) => Self::Conflict(err.to_string()),
            TransferError::Database(inner) => Self::Database(inner.to_string()),
        }
    }
}

/// Input for creating a transfer record.
#[derive(Debug, Clone)]
pub struct CreateTransferInput {
    /// Trace shared with the ledger postings.
    pub trace_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Destination ledger account key (intra) or bank account (inter).
    pub counterparty: String,
    /// Intra- or inter-bank.
    pub transfer_type: TransferKind,
    /// Amount in minor units.
    pub amount_minor_units: i64,
    /// Currency of the amount.
    pub currency: Currency,
    /// Unique, externally visible reference.
    pub reference: String,
    /// Optional statement narration.
    pub narration: Option<String>,
}

/// Transfer repository.
#[derive(Debug, Clone)]
pub struct TransferRepository {
    db: DatabaseConnection,
}

impl TransferRepository {
    /// Creates a new transfer repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a pending transfer inside the caller's atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::DuplicateReference` if the reference is
    /// already taken.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: CreateTransferInput,
    ) -> Result<transfers::Model, TransferError> {
        let now = Utc::now().into();
        let transfer = transfers::ActiveModel {
            id: Set(Uuid::now_v7()),
            trace_id: Set(input.trace_id),
            user_id: Set(input.user_id),
            counterparty: Set(input.counterparty),
            transfer_type: Set(input.transfer_type.to_string()),
            amount: Set(input.amount_minor_units),
            currency: Set(input.currency.to_string()),
            status: Set(SettlementStatus::Pending),
            reference: Set(input.reference.clone()),
            provider_ref: Set(None),
            session_id: Set(None),
            narration: Set(input.narration),
            created_at: Set(now),
            updated_at: Set(now),
            processed_at: Set(None),
        };

        transfer.insert(conn).await.map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                TransferError::DuplicateReference(input.reference)
            } else {
                err.into()
            }
        })
    }

    /// Looks a transfer up by ID.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<transfers::Model>, TransferError> {
        Ok(transfers::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Looks a transfer up by reference.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<transfers::Model>, TransferError> {
        Ok(transfers::Entity::find()
            .filter(transfers::Column::Reference.eq(reference))
            .one(&self.db)
            .await?)
    }

    /// Oldest-first bounded batch of pending transfers for the
    /// reconciliation poller.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_pending_batch(
        &self,
        limit: u64,
    ) -> Result<Vec<transfers::Model>, TransferError> {
        Ok(transfers::Entity::find()
            .filter(transfers::Column::Status.eq(SettlementStatus::Pending))
            .order_by_asc(transfers::Column::CreatedAt)
            .order_by_asc(transfers::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Claims a pending transfer for reconciliation.
    ///
    /// Atomic `PENDING -> PROCESSING` conditional update; exactly one of
    /// any number of concurrent pollers wins.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn claim(&self, id: Uuid) -> Result<bool, TransferError> {
        self.transition(id, SettlementStatus::Pending, SettlementStatus::Processing, false)
            .await
    }

    /// Releases a claim, returning the transfer to the pending pool.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn release(&self, id: Uuid) -> Result<bool, TransferError> {
        self.transition(id, SettlementStatus::Processing, SettlementStatus::Pending, false)
            .await
    }

    /// Stores the provider's identifiers after a successful dispatch.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::NotFound` for an unknown transfer.
    pub async fn set_provider_ref(
        &self,
        id: Uuid,
        provider_ref: &str,
        session_id: Option<&str>,
    ) -> Result<(), TransferError> {
        let transfer = transfers::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(TransferError::NotFound(id))?;

        let mut active: transfers::ActiveModel = transfer.into();
        active.provider_ref = Set(Some(provider_ref.to_string()));
        active.session_id = Set(session_id.map(String::from));
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await?;
        Ok(())
    }

    /// Marks a claimed transfer completed inside the caller's atomic
    /// unit.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn mark_completed<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<bool, TransferError> {
        self.transition_on(conn, id, SettlementStatus::Processing, SettlementStatus::Completed, true)
            .await
    }

    /// Marks a claimed transfer failed inside the caller's atomic unit.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn mark_failed<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<bool, TransferError> {
        self.transition_on(conn, id, SettlementStatus::Processing, SettlementStatus::Failed, true)
            .await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: SettlementStatus,
        to: SettlementStatus,
        terminal: bool,
    ) -> Result<bool, TransferError> {
        self.transition_on(&self.db, id, from, to, terminal).await
    }

    async fn transition_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
        from: SettlementStatus,
        to: SettlementStatus,
        terminal: bool,
    ) -> Result<bool, TransferError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let mut update = transfers::Entity::update_many()
            .col_expr(transfers::Column::Status, Expr::value(to))
            .col_expr(transfers::Column::UpdatedAt, Expr::value(now))
            .filter(transfers::Column::Id.eq(id))
            .filter(transfers::Column::Status.eq(from));
        if terminal {
            update = update.col_expr(transfers::Column::ProcessedAt, Expr::value(Some(now)));
        }
        let result = update.exec(conn).await?;
        Ok(result.rows_affected == 1)
    }
}
