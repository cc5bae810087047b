//! Bill payment settlement orchestrator.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use settla_core::ledger::{Account, EntryStatus, EntryType, LedgerCategory};
use settla_core::settlement::SettlementStatus;
use settla_db::repositories::{
    BillPaymentRepository, CreateBillPaymentInput, CreateEntryInput, IdempotencyRepository,
    LedgerRepository, OutboxRepository, ledger::DoubleEntryInput,
};
use settla_shared::config::SettlementConfig;
use settla_shared::types::{Currency, UserId, money::to_minor_units};
use settla_shared::{AppError, AppResult};

use crate::dispatcher::{BillDispatchPayload, TOPIC_BILL_PAYMENT_INITIATE};
use crate::metrics::SettlementMetrics;
use crate::reference::derive_reference;
use crate::{db_err, json_err, secs};

/// A validated bill payment request.
#[derive(Debug, Clone)]
pub struct PayBillRequest {
    /// Caller-supplied idempotency key.
    pub idempotency_key: String,
    /// Biller slug, e.g. "dstv".
    pub biller: String,
    /// Customer identifier at the biller.
    pub customer_ref: String,
    /// Decimal bill amount.
    pub amount: Decimal,
    /// Optional platform fee.
    pub fee: Option<Decimal>,
    /// Currency of the amounts.
    pub currency: Currency,
}

/// The caller-visible result of a bill payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPaymentReceipt {
    /// Domain record ID.
    pub bill_payment_id: Uuid,
    /// Trace correlating the ledger postings.
    pub trace_id: Uuid,
    /// Externally visible unique reference.
    pub reference: String,
    /// Settlement status at the time of the response.
    pub status: SettlementStatus,
    /// Bill amount in minor units.
    pub amount_minor_units: i64,
    /// Platform fee in minor units.
    pub fee_minor_units: i64,
    /// Currency of the amounts.
    pub currency: Currency,
}

/// Bill payment orchestrator.
///
/// One atomic unit per request: bill record, pending bill debit, the fee
/// double entry on the same trace, and the outbox intent.
#[derive(Clone)]
pub struct BillPaymentService {
    db: DatabaseConnection,
    ledger: LedgerRepository,
    outbox: OutboxRepository,
    idempotency: IdempotencyRepository,
    bills: BillPaymentRepository,
    config: SettlementConfig,
    metrics: Arc<SettlementMetrics>,
}

impl BillPaymentService {
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
            outbox: OutboxRepository::new(db.clone()),
            idempotency: IdempotencyRepository::new(db.clone()),
            bills: BillPaymentRepository::new(db.clone()),
            db,
            config,
            metrics,
        }
    }

    /// Pays a bill.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` before any write for a non-positive amount or
    /// fee, `Conflict` when the derived reference already exists, or a
    /// database error.
    pub async fn pay(&self, principal: UserId, request: PayBillRequest) -> AppResult<BillPaymentReceipt> {
        let amount = to_minor_units(request.amount)?;
        let fee = match request.fee {
            Some(fee) => to_minor_units(fee)?,
            None => 0,
        };

        if let Some(stored) = self
            .idempotency
            .check(&request.idempotency_key, principal.into_inner())
            .await
            .map_err(AppError::from)?
        {
            let receipt: BillPaymentReceipt = serde_json::from_value(stored).map_err(json_err)?;
            info!(reference = %receipt.reference, "bill payment replayed from idempotency guard");
            return Ok(receipt);
        }

        let trace_id = Uuid::now_v7();
        let reference = derive_reference("BIL", &request.idempotency_key, principal.into_inner());

        let txn = self.db.begin().await.map_err(db_err)?;

        let payment = self
            .bills
            .create(
                &txn,
                CreateBillPaymentInput {
                    trace_id,
                    user_id: principal.into_inner(),
                    biller: request.biller.clone(),
                    customer_ref: request.customer_ref.clone(),
                    amount_minor_units: amount,
                    fee_minor_units: fee,
                    currency: request.currency,
                    reference: reference.clone(),
                },
            )
            .await
            .map_err(AppError::from)?;

        let mut debit = CreateEntryInput::pending(
            trace_id,
            Some(principal.into_inner()),
            Account::UserWallet(principal),
            EntryType::Debit,
            LedgerCategory::BillPayment,
            amount,
            request.currency,
        );
        debit.subtype = Some(request.biller.clone());
        debit.idempotency_key = Some(request.idempotency_key.clone());
        debit.meta = serde_json::json!({ "reference": reference, "customer_ref": request.customer_ref });
        self.ledger
            .create_entry(&txn, debit)
            .await
            .map_err(AppError::from)?;

        if fee > 0 {
            self.ledger
                .create_double_entry(
                    &txn,
                    DoubleEntryInput {
                        trace_id,
                        from_account: Account::UserWallet(principal),
                        to_account: Account::PlatformRevenue,
                        amount_minor_units: fee,
                        category: LedgerCategory::Fee,
                        currency: request.currency,
                        user_id: Some(principal.into_inner()),
                        subtype: Some(request.biller.clone()),
                        status: EntryStatus::Pending,
                        meta: serde_json::json!({ "reference": reference }),
                    },
                )
                .await
                .map_err(AppError::from)?;
        }

        let payload = BillDispatchPayload {
            bill_payment_id: payment.id,
            reference: reference.clone(),
            biller: request.biller,
            customer_ref: request.customer_ref,
            from_account: Account::UserWallet(principal).to_string(),
            amount_minor_units: amount,
        };
        self.outbox
            .enqueue(
                &txn,
                TOPIC_BILL_PAYMENT_INITIATE,
                serde_json::to_value(&payload).map_err(json_err)?,
            )
            .await
            .map_err(AppError::from)?;

        txn.commit().await.map_err(db_err)?;

        let receipt = BillPaymentReceipt {
            bill_payment_id: payment.id,
            trace_id,
            reference: reference.clone(),
            status: SettlementStatus::Pending,
            amount_minor_units: amount,
            fee_minor_units: fee,
            currency: request.currency,
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

        self.metrics
            .entries_created(LedgerCategory::BillPayment, 1);
        if fee > 0 {
            self.metrics.entries_created(LedgerCategory::Fee, 2);
        }
        self.metrics.pending_adjust(1);
        info!(bill_payment_id = %payment.id, %reference, amount, fee, "bill payment initiated");
        Ok(receipt)
    }

    /// Fetches one bill payment as its owner sees it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown record, `Unauthorized` when the
    /// principal does not own it.
    pub async fn get(&self, principal: UserId, bill_payment_id: Uuid) -> AppResult<BillPaymentReceipt> {
        let payment = self
            .bills
            .find_by_id(bill_payment_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                AppError::NotFound(format!("Bill payment not found: {bill_payment_id}"))
            })?;

        if payment.user_id != principal.into_inner() {
            return Err(AppError::Unauthorized(format!(
                "bill payment {bill_payment_id} belongs to another user"
            )));
        }

        let currency = payment
            .currency
            .parse::<Currency>()
            .map_err(AppError::Internal)?;

        Ok(BillPaymentReceipt {
            bill_payment_id: payment.id,
            trace_id: payment.trace_id,
            reference: payment.reference,
            status: payment.status.into(),
            amount_minor_units: payment.amount,
            fee_minor_units: payment.fee,
            currency,
        })
    }
}
