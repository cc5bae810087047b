//! Bill payment repository for domain settlement records.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    sea_query::Expr,
};
use thiserror::Error;
use uuid::Uuid;

use settla_shared::types::Currency;

use crate::entities::{bill_payments, sea_orm_active_enums::SettlementStatus};

/// Error types for bill payment operations.
#[derive(Debug, Error)]
pub enum BillPaymentError {
    /// Bill payment not found.
    #[error("Bill payment not found: {0}")]
    NotFound(Uuid),

    /// A bill payment with this reference already exists.
    #[error("Bill payment reference already exists: {0}")]
    DuplicateReference(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<BillPaymentError> for settla_shared::AppError {
    fn from(err: BillPaymentError) -> Self {
        match err {
            BillPaymentError::NotFound(_) => Self::NotFound(err.to_string()),
            BillPaymentError::DuplicateReference(_) => Self::Conflict(err.to_string()),
            BillPaymentError::Database(inner) => Self::Database(inner.to_string()),
        }
    }
}

/// Input for creating a bill payment record.
#[derive(Debug, Clone)]
pub struct CreateBillPaymentInput {
    /// Trace shared with the ledger postings.
    pub trace_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Biller slug.
    pub biller: String,
    /// Customer identifier at the biller.
    pub customer_ref: String,
    /// Bill amount in minor units.
    pub amount_minor_units: i64,
    /// Platform fee in minor units (zero allowed).
    pub fee_minor_units: i64,
    /// Currency of the amounts.
    pub currency: Currency,
    /// Unique, externally visible reference.
    pub reference: String,
}

/// Bill payment repository.
#[derive(Debug, Clone)]
pub struct BillPaymentRepository {
    db: DatabaseConnection,
}

impl BillPaymentRepository {
    /// Creates a new bill payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a pending bill payment inside the caller's atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `BillPaymentError::DuplicateReference` if the reference
    /// is already taken.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: CreateBillPaymentInput,
    ) -> Result<bill_payments::Model, BillPaymentError> {
        let now = Utc::now().into();
        let payment = bill_payments::ActiveModel {
            id: Set(Uuid::now_v7()),
            trace_id: Set(input.trace_id),
            user_id: Set(input.user_id),
            biller: Set(input.biller),
            customer_ref: Set(input.customer_ref),
            amount: Set(input.amount_minor_units),
            fee: Set(input.fee_minor_units),
            currency: Set(input.currency.to_string()),
            status: Set(SettlementStatus::Pending),
            reference: Set(input.reference.clone()),
            provider_ref: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            processed_at: Set(None),
        };

        payment.insert(conn).await.map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                BillPaymentError::DuplicateReference(input.reference)
            } else {
                err.into()
            }
        })
    }

    /// Looks a bill payment up by ID.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<bill_payments::Model>, BillPaymentError> {
        Ok(bill_payments::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Oldest-first bounded batch of pending bill payments.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_pending_batch(
        &self,
        limit: u64,
    ) -> Result<Vec<bill_payments::Model>, BillPaymentError> {
        Ok(bill_payments::Entity::find()
            .filter(bill_payments::Column::Status.eq(SettlementStatus::Pending))
            .order_by_asc(bill_payments::Column::CreatedAt)
            .order_by_asc(bill_payments::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Claims a pending bill payment for reconciliation
    /// (`PENDING -> PROCESSING`, atomic).
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn claim(&self, id: Uuid) -> Result<bool, BillPaymentError> {
        self.transition_on(&self.db, id, SettlementStatus::Pending, SettlementStatus::Processing, false)
            .await
    }

    /// Releases a claim back to the pending pool.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn release(&self, id: Uuid) -> Result<bool, BillPaymentError> {
        self.transition_on(&self.db, id, SettlementStatus::Processing, SettlementStatus::Pending, false)
            .await
    }

    /// Stores the provider reference after dispatch.
    ///
    /// # Errors
    ///
    /// Returns `BillPaymentError::NotFound` for an unknown record.
    pub async fn set_provider_ref(
        &self,
        id: Uuid,
        provider_ref: &str,
    ) -> Result<(), BillPaymentError> {
        let payment = bill_payments::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(BillPaymentError::NotFound(id))?;

        let mut active: bill_payments::ActiveModel = payment.into();
        active.provider_ref = Set(Some(provider_ref.to_string()));
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await?;
        Ok(())
    }

    /// Marks a claimed bill payment completed inside the caller's atomic
    /// unit.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn mark_completed<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<bool, BillPaymentError> {
        self.transition_on(conn, id, SettlementStatus::Processing, SettlementStatus::Completed, true)
            .await
    }

    /// Marks a claimed bill payment failed inside the caller's atomic
    /// unit.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn mark_failed<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<bool, BillPaymentError> {
        self.transition_on(conn, id, SettlementStatus::Processing, SettlementStatus::Failed, true)
            .await
    }

    async fn transition_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
        from: SettlementStatus,
        to: SettlementStatus,
        terminal: bool,
    ) -> Result<bool, BillPaymentError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let mut update = bill_payments::Entity::update_many()
            .col_expr(bill_payments::Column::Status, Expr::value(to))
            .col_expr(bill_payments::Column::UpdatedAt, Expr::value(now))
            .filter(bill_payments::Column::Id.eq(id))
            .filter(bill_payments::Column::Status.eq(from));
        if terminal {
            update = update.col_expr(bill_payments::Column::ProcessedAt, Expr::value(Some(now)));
        }
        let result = update.exec(conn).await?;
        Ok(result.rows_affected == 1)
    }
}
