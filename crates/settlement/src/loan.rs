//! Loan application and disbursement orchestrator.
//!
//! Applications hold no money; disbursement moves the principal from
//! the loan pool into the borrower's wallet as a synchronously
//! completed double entry.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use settla_core::ledger::{Account, EntryStatus, LedgerCategory};
use settla_db::entities::sea_orm_active_enums::LoanStatus;
use settla_db::repositories::{
    CreateLoanApplicationInput, IdempotencyRepository, LedgerRepository, LoanRepository,
    ledger::DoubleEntryInput,
};
use settla_shared::config::SettlementConfig;
use settla_shared::types::{Currency, UserId, money::to_minor_units};
use settla_shared::{AppError, AppResult};

use crate::metrics::SettlementMetrics;
use crate::reference::derive_reference;
use crate::{db_err, json_err, secs};

/// A validated loan application request.
#[derive(Debug, Clone)]
pub struct ApplyLoanRequest {
    /// Caller-supplied idempotency key.
    pub idempotency_key: String,
    /// Requested principal as a decimal amount.
    pub principal: Decimal,
    /// Currency of the principal.
    pub currency: Currency,
}

/// The caller-visible view of a loan application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReceipt {
    /// Application ID.
    pub application_id: Uuid,
    /// Externally visible unique reference.
    pub reference: String,
    /// Application status.
    pub status: LoanStatus,
    /// Principal in minor units.
    pub principal_minor_units: i64,
    /// Currency of the principal.
    pub currency: Currency,
    /// Disbursement trace, once disbursed.
    pub trace_id: Option<Uuid>,
}

/// Loan orchestrator.
#[derive(Clone)]
pub struct LoanService {
    db: DatabaseConnection,
    ledger: LedgerRepository,
    idempotency: IdempotencyRepository,
    loans: LoanRepository,
    config: SettlementConfig,
    metrics: Arc<SettlementMetrics>,
}

impl LoanService {
    /// Creates the service with its repositories over one connection
    /// pool.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        config: SettlementConfig,
        metrics: Arc<SettlementMetrics>,
    ) -> Self {
        Self {
            ledger: LedgerRepository::new(db.clone()),
            idempotency: IdempotencyRepository::new(db.clone()),
            loans: LoanRepository::new(db.clone()),
            db,
            config,
            metrics,
        }
    }

    /// Submits a loan application. No money moves.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for a non-positive principal, `Conflict` on a
    /// duplicate reference, or a database error.
    pub async fn apply(&self, principal: UserId, request: ApplyLoanRequest) -> AppResult<LoanReceipt> {
        let amount = to_minor_units(request.principal)?;

        if let Some(stored) = self
            .idempotency
            .check(&request.idempotency_key, principal.into_inner())
            .await
            .map_err(AppError::from)?
        {
            let receipt: LoanReceipt = serde_json::from_value(stored).map_err(json_err)?;
            info!(reference = %receipt.reference, "loan application replayed from idempotency guard");
            return Ok(receipt);
        }

        let reference = derive_reference("LON", &request.idempotency_key, principal.into_inner());
        let application = self
            .loans
            .create(CreateLoanApplicationInput {
                user_id: principal.into_inner(),
                principal_minor_units: amount,
                currency: request.currency,
                reference: reference.clone(),
            })
            .await
            .map_err(AppError::from)?;

        let receipt = LoanReceipt {
            application_id: application.id,
            reference: reference.clone(),
            status: LoanStatus::Applied,
            principal_minor_units: amount,
            currency: request.currency,
            trace_id: None,
        };

        self.idempotency
            .save(
                &request.idempotency_key,
                principal.into_inner(),
                serde_json::to_value(&receipt).map_err(json_err)?,
                secs(self.config.idempotency_ttl_secs),
            )
            .await
            .map_err(AppError::from)?;

        info!(application_id = %application.id, %reference, "loan application recorded");
        Ok(receipt)
    }

    /// Approves an application.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown application,
    /// `InvalidStateTransition` if it is not in the APPLIED state.
    pub async fn approve(&self, application_id: Uuid) -> AppResult<()> {
        self.loans
            .find_by_id(application_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                AppError::NotFound(format!("Loan application not found: {application_id}"))
            })?;

        if self.loans.approve(application_id).await.map_err(AppError::from)? {
            info!(%application_id, "loan application approved");
            Ok(())
        } else {
            Err(AppError::InvalidStateTransition(format!(
                "loan application {application_id} is not awaiting approval"
            )))
        }
    }

    /// Disburses an approved loan into the borrower's wallet.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when the principal does not own the application,
    /// `InvalidStateTransition` if it is not approved, or a database
    /// error.
    pub async fn disburse(
        &self,
        principal: UserId,
        application_id: Uuid,
        idempotency_key: &str,
    ) -> AppResult<LoanReceipt> {
        let application = self
            .loans
            .find_by_id(application_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                AppError::NotFound(format!("Loan application not found: {application_id}"))
            })?;

        if application.user_id != principal.into_inner() {
            return Err(AppError::Unauthorized(format!(
                "loan application {application_id} belongs to another user"
            )));
        }

        if let Some(stored) = self
            .idempotency
            .check(idempotency_key, principal.into_inner())
            .await
            .map_err(AppError::from)?
        {
            let receipt: LoanReceipt = serde_json::from_value(stored).map_err(json_err)?;
            info!(reference = %receipt.reference, "loan disbursement replayed from idempotency guard");
            return Ok(receipt);
        }

        if application.status != LoanStatus::Approved {
            return Err(AppError::InvalidStateTransition(format!(
                "loan application {application_id} is not approved"
            )));
        }

        let currency = application
            .currency
            .parse::<Currency>()
            .map_err(AppError::Internal)?;
        let trace_id = Uuid::now_v7();

        let txn = self.db.begin().await.map_err(db_err)?;

        self.ledger
            .create_double_entry(
                &txn,
                DoubleEntryInput {
                    trace_id,
                    from_account: Account::LoanPool,
                    to_account: Account::UserWallet(principal),
                    amount_minor_units: application.principal,
                    category: LedgerCategory::Loan,
                    currency,
                    user_id: Some(principal.into_inner()),
                    subtype: None,
                    status: EntryStatus::Pending,
                    meta: serde_json::json!({ "reference": application.reference }),
                },
            )
            .await
            .map_err(AppError::from)?;

        self.ledger
            .update_status_by_trace(&txn, trace_id, EntryStatus::Completed)
            .await
            .map_err(AppError::from)?;

        if !self
            .loans
            .mark_disbursed(&txn, application_id, trace_id)
            .await
            .map_err(AppError::from)?
        {
            txn.rollback().await.map_err(db_err)?;
            return Err(AppError::InvalidStateTransition(format!(
                "loan application {application_id} changed state during disbursement"
            )));
        }

        txn.commit().await.map_err(db_err)?;

        let receipt = LoanReceipt {
            application_id,
            reference: application.reference,
            status: LoanStatus::Disbursed,
            principal_minor_units: application.principal,
            currency,
            trace_id: Some(trace_id),
        };

        self.idempotency
            .save(
                idempotency_key,
                principal.into_inner(),
                serde_json::to_value(&receipt).map_err(json_err)?,
                secs(self.config.idempotency_ttl_secs),
            )
            .await
            .map_err(AppError::from)?;

        self.metrics.entries_created(LedgerCategory::Loan, 2);
        info!(%application_id, %trace_id, "loan disbursed");
        Ok(receipt)
    }
}
