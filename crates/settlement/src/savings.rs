//! Savings settlement orchestrator.
//!
//! Savings movements never leave the platform, so they settle
//! synchronously: the double entry is posted and completed inside the
//! same atomic unit as the domain record. No outbox intent is needed.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use settla_core::ledger::{Account, EntryStatus, LedgerCategory};
use settla_core::settlement::SettlementStatus;
use settla_db::entities::sea_orm_active_enums::SavingsKind;
use settla_db::entities::sea_orm_active_enums::SettlementStatus as DbSettlementStatus;
use settla_db::repositories::{
    CreateSavingsTransactionInput, IdempotencyRepository, LedgerRepository, SavingsRepository,
    ledger::DoubleEntryInput,
};
use settla_shared::config::SettlementConfig;
use settla_shared::types::{Currency, UserId, money::to_minor_units};
use settla_shared::{AppError, AppResult};

use crate::metrics::SettlementMetrics;
use crate::reference::derive_reference;
use crate::{db_err, json_err, secs};

/// A validated savings movement request.
#[derive(Debug, Clone)]
pub struct SavingsRequest {
    /// Caller-supplied idempotency key.
    pub idempotency_key: String,
    /// Decimal amount.
    pub amount: Decimal,
    /// Currency of the amount.
    pub currency: Currency,
}

/// The caller-visible result of a savings operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsReceipt {
    /// Domain record ID.
    pub savings_transaction_id: Uuid,
    /// Trace correlating the ledger postings.
    pub trace_id: Uuid,
    /// Externally visible unique reference.
    pub reference: String,
    /// Settlement status; savings settle synchronously.
    pub status: SettlementStatus,
    /// Kind of movement.
    pub kind: SavingsKind,
    /// Amount in minor units.
    pub amount_minor_units: i64,
    /// Currency of the amount.
    pub currency: Currency,
}

/// Savings orchestrator.
#[derive(Clone)]
pub struct SavingsService {
    db: DatabaseConnection,
    ledger: LedgerRepository,
    idempotency: IdempotencyRepository,
    savings: SavingsRepository,
    config: SettlementConfig,
    metrics: Arc<SettlementMetrics>,
}

impl SavingsService {
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
            savings: SavingsRepository::new(db.clone()),
            db,
            config,
            metrics,
        }
    }

    /// Moves money from the user's wallet into the savings pool.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` before any write, `Conflict` on a duplicate
    /// reference, or a database error.
    pub async fn deposit(
        &self,
        principal: UserId,
        request: SavingsRequest,
    ) -> AppResult<SavingsReceipt> {
        self.settle(
            principal,
            request,
            SavingsKind::Deposit,
            Account::UserWallet(principal),
            Account::SavingsPool,
            "SAV",
        )
        .await
    }

    /// Moves money from the savings pool back to the user's wallet.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` before any write, `Conflict` on a duplicate
    /// reference, or a database error.
    pub async fn withdraw(
        &self,
        principal: UserId,
        request: SavingsRequest,
    ) -> AppResult<SavingsReceipt> {
        self.settle(
            principal,
            request,
            SavingsKind::Withdrawal,
            Account::SavingsPool,
            Account::UserWallet(principal),
            "SWD",
        )
        .await
    }

    /// Pays accrued interest from the interest pool into the savings
    /// pool for a user. The interest amount is computed upstream; only
    /// the settlement mechanics live here.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` before any write, `Conflict` on a duplicate
    /// reference, or a database error.
    pub async fn settle_interest(
        &self,
        user: UserId,
        request: SavingsRequest,
    ) -> AppResult<SavingsReceipt> {
        self.settle(
            user,
            request,
            SavingsKind::Interest,
            Account::InterestPool,
            Account::SavingsPool,
            "INT",
        )
        .await
    }

    /// Fetches one savings transaction as its owner sees it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown record, `Unauthorized` when the
    /// principal does not own it.
    pub async fn get(&self, principal: UserId, id: Uuid) -> AppResult<SavingsReceipt> {
        let record = self
            .savings
            .find_by_id(id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound(format!("Savings transaction not found: {id}")))?;

        if record.user_id != principal.into_inner() {
            return Err(AppError::Unauthorized(format!(
                "savings transaction {id} belongs to another user"
            )));
        }

        let currency = record
            .currency
            .parse::<Currency>()
            .map_err(AppError::Internal)?;

        Ok(SavingsReceipt {
            savings_transaction_id: record.id,
            trace_id: record.trace_id,
            reference: record.reference,
            status: record.status.into(),
            kind: record.kind,
            amount_minor_units: record.amount,
            currency,
        })
    }

    async fn settle(
        &self,
        user: UserId,
        request: SavingsRequest,
        kind: SavingsKind,
        from_account: Account,
        to_account: Account,
        prefix: &str,
    ) -> AppResult<SavingsReceipt> {
        let amount = to_minor_units(request.amount)?;

        if let Some(stored) = self
            .idempotency
            .check(&request.idempotency_key, user.into_inner())
            .await
            .map_err(AppError::from)?
        {
            let receipt: SavingsReceipt = serde_json::from_value(stored).map_err(json_err)?;
            info!(reference = %receipt.reference, "savings request replayed from idempotency guard");
            return Ok(receipt);
        }

        let trace_id = Uuid::now_v7();
        let reference = derive_reference(prefix, &request.idempotency_key, user.into_inner());

        let txn = self.db.begin().await.map_err(db_err)?;

        let record = self
            .savings
            .create(
                &txn,
                CreateSavingsTransactionInput {
                    trace_id,
                    user_id: user.into_inner(),
                    kind: kind.clone(),
                    amount_minor_units: amount,
                    currency: request.currency,
                    status: DbSettlementStatus::Completed,
                    reference: reference.clone(),
                },
            )
            .await
            .map_err(AppError::from)?;

        self.ledger
            .create_double_entry(
                &txn,
                DoubleEntryInput {
                    trace_id,
                    from_account,
                    to_account,
                    amount_minor_units: amount,
                    category: LedgerCategory::Savings,
                    currency: request.currency,
                    user_id: Some(user.into_inner()),
                    subtype: None,
                    status: EntryStatus::Pending,
                    meta: serde_json::json!({ "reference": reference }),
                },
            )
            .await
            .map_err(AppError::from)?;

        // Synchronous completion: no provider leg to wait for.
        self.ledger
            .update_status_by_trace(&txn, trace_id, EntryStatus::Completed)
            .await
            .map_err(AppError::from)?;

        txn.commit().await.map_err(db_err)?;

        let receipt = SavingsReceipt {
            savings_transaction_id: record.id,
            trace_id,
            reference: reference.clone(),
            status: SettlementStatus::Completed,
            kind,
            amount_minor_units: amount,
            currency: request.currency,
        };

        self.idempotency
            .save(
                &request.idempotency_key,
                user.into_inner(),
                serde_json::to_value(&receipt).map_err(json_err)?,
                secs(self.config.idempotency_ttl_secs),
            )
            .await
            .map_err(AppError::from)?;

        self.metrics.entries_created(LedgerCategory::Savings, 2);
        info!(savings_transaction_id = %record.id, %reference, amount, "savings movement settled");
        Ok(receipt)
    }
}
