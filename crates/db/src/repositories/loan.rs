//! Loan application repository.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, SqlErr,
    sea_query::Expr,
};
use thiserror::Error;
use uuid::Uuid;

use settla_shared::types::Currency;

use crate::entities::{loan_applications, sea_orm_active_enums::LoanStatus};

/// Error types for loan operations.
#[derive(Debug, Error)]
pub enum LoanError {
    /// Loan application not found.
    #[error("Loan application not found: {0}")]
    NotFound(Uuid),

    /// A loan application with this reference already exists.
    #[error("Loan reference already exists: {0}")]
    DuplicateReference(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<LoanError> for settla_shared::AppError {
    fn from(err: LoanError) -> Self {
        match err {
            LoanError::NotFound(_) => Self::NotFound(err.to_string()),
            LoanError::DuplicateReference(_) => Self::Conflict(err.to_string()),
            LoanError::Database(inner) => Self::Database(inner.to_string()),
        }
    }
}

/// Input for creating a loan application.
#[derive(Debug, Clone)]
pub struct CreateLoanApplicationInput {
    /// Applying user.
    pub user_id: Uuid,
    /// Requested principal in minor units.
    pub principal_minor_units: i64,
    /// Currency of the principal.
    pub currency: Currency,
    /// Unique, externally visible reference.
    pub reference: String,
}

/// Loan application repository.
#[derive(Debug, Clone)]
pub struct LoanRepository {
    db: DatabaseConnection,
}

impl LoanRepository {
    /// Creates a new loan repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a new application in the `APPLIED` state.
    ///
    /// # Errors
    ///
    /// Returns `LoanError::DuplicateReference` if the reference is
    /// already taken.
    pub async fn create(
        &self,
        input: CreateLoanApplicationInput,
    ) -> Result<loan_applications::Model, LoanError> {
        let now = Utc::now().into();
        let application = loan_applications::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.user_id),
            principal: Set(input.principal_minor_units),
            currency: Set(input.currency.to_string()),
            status: Set(LoanStatus::Applied),
            trace_id: Set(None),
            reference: Set(input.reference.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            disbursed_at: Set(None),
        };

        application.insert(&self.db).await.map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                LoanError::DuplicateReference(input.reference)
            } else {
                err.into()
            }
        })
    }

    /// Looks an application up by ID.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<loan_applications::Model>, LoanError> {
        Ok(loan_applications::Entity::find_by_id(id)
            .one(&self.db)
            .await?)
    }

    /// Approves an application (`APPLIED -> APPROVED`, atomic).
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn approve(&self, id: Uuid) -> Result<bool, LoanError> {
        self.transition(id, LoanStatus::Applied, LoanStatus::Approved)
            .await
    }

    /// Rejects an application (`APPLIED -> REJECTED`, atomic).
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn reject(&self, id: Uuid) -> Result<bool, LoanError> {
        self.transition(id, LoanStatus::Applied, LoanStatus::Rejected)
            .await
    }

    /// Marks an approved application disbursed inside the caller's
    /// atomic unit, linking it to the disbursement trace.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn mark_disbursed<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
        trace_id: Uuid,
    ) -> Result<bool, LoanError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let result = loan_applications::Entity::update_many()
            .col_expr(
                loan_applications::Column::Status,
                Expr::value(LoanStatus::Disbursed),
            )
            .col_expr(
                loan_applications::Column::TraceId,
                Expr::value(Some(trace_id)),
            )
            .col_expr(loan_applications::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                loan_applications::Column::DisbursedAt,
                Expr::value(Some(now)),
            )
            .filter(loan_applications::Column::Id.eq(id))
            .filter(loan_applications::Column::Status.eq(LoanStatus::Approved))
            .exec(conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: LoanStatus,
        to: LoanStatus,
    ) -> Result<bool, LoanError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let result = loan_applications::Entity::update_many()
            .col_expr(loan_applications::Column::Status, Expr::value(to))
            .col_expr(loan_applications::Column::UpdatedAt, Expr::value(now))
            .filter(loan_applications::Column::Id.eq(id))
            .filter(loan_applications::Column::Status.eq(from))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
