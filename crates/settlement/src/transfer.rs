//! Transfer settlement orchestrator.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use settla_core::ledger::{Account, EntryType, LedgerCategory};
use settla_core::provider::TransferKind;
use settla_core::settlement::SettlementStatus;
use settla_db::repositories::{
    CreateEntryInput, CreateTransferInput, IdempotencyRepository, LedgerRepository,
    OutboxRepository, TransferRepository,
};
use settla_shared::config::SettlementConfig;
use settla_shared::types::{Currency, UserId, money::to_minor_units};
use settla_shared::{AppError, AppResult};

use crate::dispatcher::{TOPIC_TRANSFER_INITIATE, TransferDispatchPayload};
use crate::metrics::SettlementMetrics;
use crate::reference::derive_reference;
use crate::{db_err, json_err, secs};

/// Where a transfer sends the money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDestination {
    /// Another wallet inside the platform.
    Wallet(UserId),
    /// An account at another bank, settled over the provider rail.
    BankAccount {
        /// Destination account number.
        account_number: String,
    },
}

/// A validated transfer request.
#[derive(Debug, Clone)]
pub struct InitiateTransferRequest {
    /// Caller-supplied idempotency key; one key per intended operation.
    pub idempotency_key: String,
    /// Decimal amount; converted to minor units at this boundary.
    pub amount: Decimal,
    /// Currency of the amount.
    pub currency: Currency,
    /// Destination of the funds.
    pub destination: TransferDestination,
    /// Optional statement narration.
    pub narration: Option<String>,
}

/// The caller-visible result of a transfer operation.
///
/// Stored verbatim as the idempotency response, so a replayed request
/// returns a byte-identical receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Domain record ID.
    pub transfer_id: Uuid,
    /// Trace correlating the ledger postings.
    pub trace_id: Uuid,
    /// Externally visible unique reference.
    pub reference: String,
    /// Settlement status at the time of the response.
    pub status: SettlementStatus,
    /// Amount in minor units.
    pub amount_minor_units: i64,
    /// Currency of the amount.
    pub currency: Currency,
}

/// Transfer orchestrator.
///
/// Per request: idempotency check first; on miss, one atomic unit writes
/// the transfer record, the pending escrow debit, and the outbox intent;
/// the idempotency record is saved after commit.
#[derive(Clone)]
pub struct TransferService {
    db: DatabaseConnection,
    ledger: LedgerRepository,
    outbox: OutboxRepository,
    idempotency: IdempotencyRepository,
    transfers: TransferRepository,
    config: SettlementConfig,
    metrics: Arc<SettlementMetrics>,
}

impl TransferService {
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
            transfers: TransferRepository::new(db.clone()),
            db,
            config,
            metrics,
        }
    }

    /// Initiates a transfer.
    ///
    /// Posts the PENDING escrow debit on the payer wallet and queues the
    /// provider dispatch. Settlement happens asynchronously via the
    /// outbox dispatcher and the reconciliation poller.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` before any write for a non-positive amount,
    /// `Validation` for a self-transfer, `Conflict` when the derived
    /// reference already exists (post-crash retry window), or a database
    /// error.
    pub async fn initiate(
        &self,
        principal: UserId,
        request: InitiateTransferRequest,
    ) -> AppResult<TransferReceipt> {
        let amount = to_minor_units(request.amount)?;

        if let TransferDestination::Wallet(destination) = &request.destination {
            if *destination == principal {
                return Err(AppError::Validation(
                    "cannot transfer to own wallet".to_string(),
                ));
            }
        }

        if let Some(stored) = self
            .idempotency
            .check(&request.idempotency_key, principal.into_inner())
            .await
            .map_err(AppError::from)?
        {
            let receipt: TransferReceipt = serde_json::from_value(stored).map_err(json_err)?;
            info!(reference = %receipt.reference, "transfer request replayed from idempotency guard");
            return Ok(receipt);
        }

        let trace_id = Uuid::now_v7();
        let reference = derive_reference("TRF", &request.idempotency_key, principal.into_inner());
        let (counterparty, transfer_type) = match &request.destination {
            TransferDestination::Wallet(user) => {
                (Account::UserWallet(*user).to_string(), TransferKind::Intra)
            }
            TransferDestination::BankAccount { account_number } => {
                (account_number.clone(), TransferKind::Inter)
            }
        };

        let txn = self.db.begin().await.map_err(db_err)?;

        let transfer = self
            .transfers
            .create(
                &txn,
                CreateTransferInput {
                    trace_id,
                    user_id: principal.into_inner(),
                    counterparty: counterparty.clone(),
                    transfer_type,
                    amount_minor_units: amount,
                    currency: request.currency,
                    reference: reference.clone(),
                    narration: request.narration.clone(),
                },
            )
            .await
            .map_err(AppError::from)?;

        let mut debit = CreateEntryInput::pending(
            trace_id,
            Some(principal.into_inner()),
            Account::UserWallet(principal),
            EntryType::Debit,
            LedgerCategory::Transfer,
            amount,
            request.currency,
        );
        debit.idempotency_key = Some(request.idempotency_key.clone());
        debit.meta = serde_json::json!({ "reference": reference, "transfer_id": transfer.id });
        self.ledger
            .create_entry(&txn, debit)
            .await
            .map_err(AppError::from)?;

        let payload = TransferDispatchPayload {
            transfer_id: transfer.id,
            reference: reference.clone(),
            from_account: Account::UserWallet(principal).to_string(),
            to_account: counterparty,
            amount_minor_units: amount,
            transfer_type,
            remark: request.narration,
        };
        self.outbox
            .enqueue(
                &txn,
                TOPIC_TRANSFER_INITIATE,
                serde_json::to_value(&payload).map_err(json_err)?,
            )
            .await
            .map_err(AppError::from)?;

        txn.commit().await.map_err(db_err)?;

        let receipt = TransferReceipt {
            transfer_id: transfer.id,
            trace_id,
            reference: reference.clone(),
            status: SettlementStatus::Pending,
            amount_minor_units: amount,
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

        self.metrics.entries_created(LedgerCategory::Transfer, 1);
        self.metrics.pending_adjust(1);
        info!(transfer_id = %transfer.id, %reference, amount, "transfer initiated");
        Ok(receipt)
    }

    /// Fetches one transfer as its owner sees it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown transfer, `Unauthorized` when the
    /// principal does not own it.
    pub async fn get(&self, principal: UserId, transfer_id: Uuid) -> AppResult<TransferReceipt> {
        let transfer = self
            .transfers
            .find_by_id(transfer_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound(format!("Transfer not found: {transfer_id}")))?;

        if transfer.user_id != principal.into_inner() {
            return Err(AppError::Unauthorized(format!(
                "transfer {transfer_id} belongs to another user"
            )));
        }

        let currency = transfer
            .currency
            .parse::<Currency>()
            .map_err(AppError::Internal)?;

        Ok(TransferReceipt {
            transfer_id: transfer.id,
            trace_id: transfer.trace_id,
            reference: transfer.reference,
            status: transfer.status.into(),
            amount_minor_units: transfer.amount,
            currency,
        })
    }
}
