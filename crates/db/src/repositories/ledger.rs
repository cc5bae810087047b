//! Ledger repository for append-only double-entry postings.

use std::str::FromStr;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
    sea_query::Expr,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use settla_core::ledger::{
    Account, EntryRecord, EntryStatus, EntryType, Inconsistency, LedgerCategory, LedgerError,
    audit_entries, validate_amount, validate_transition,
};
use settla_shared::types::Currency;

use crate::entities::{ledger_entries, sea_orm_active_enums};

fn db_err(err: sea_orm::DbErr) -> LedgerError {
    LedgerError::Database(err.to_string())
}

/// Input for creating a single ledger entry.
#[derive(Debug, Clone)]
pub struct CreateEntryInput {
    /// Trace grouping all entries of one logical operation.
    pub trace_id: Uuid,
    /// Owning user, if the entry touches a user account.
    pub user_id: Option<Uuid>,
    /// Account the entry posts against.
    pub account: Account,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Business category.
    pub category: LedgerCategory,
    /// Optional subtype, e.g. the biller slug.
    pub subtype: Option<String>,
    /// Amount in minor units; must be positive.
    pub amount_minor_units: i64,
    /// Currency of the amount.
    pub currency: Currency,
    /// Initial status.
    pub status: EntryStatus,
    /// Counterpart entry, if already known.
    pub related_to: Option<Uuid>,
    /// Idempotency key of the originating request.
    pub idempotency_key: Option<String>,
    /// Arbitrary metadata.
    pub meta: JsonValue,
}

impl CreateEntryInput {
    /// A pending entry with no subtype, counterpart, key, or metadata.
    #[must_use]
    pub fn pending(
        trace_id: Uuid,
        user_id: Option<Uuid>,
        account: Account,
        entry_type: EntryType,
        category: LedgerCategory,
        amount_minor_units: i64,
        currency: Currency,
    ) -> Self {
        Self {
            trace_id,
            user_id,
            account,
            entry_type,
            category,
            subtype: None,
            amount_minor_units,
            currency,
            status: EntryStatus::Pending,
            related_to: None,
            idempotency_key: None,
            meta: JsonValue::Null,
        }
    }
}

/// Input for creating a paired debit/credit posting.
#[derive(Debug, Clone)]
pub struct DoubleEntryInput {
    /// Trace grouping all entries of one logical operation.
    pub trace_id: Uuid,
    /// Account debited.
    pub from_account: Account,
    /// Account credited.
    pub to_account: Account,
    /// Amount in minor units; must be positive.
    pub amount_minor_units: i64,
    /// Business category shared by both legs.
    pub category: LedgerCategory,
    /// Currency of the amount.
    pub currency: Currency,
    /// Owning user, if any.
    pub user_id: Option<Uuid>,
    /// Optional subtype shared by both legs.
    pub subtype: Option<String>,
    /// Initial status of both legs.
    pub status: EntryStatus,
    /// Arbitrary metadata shared by both legs.
    pub meta: JsonValue,
}

/// Ledger repository.
///
/// Entries are append-only: after insert only status, processed_at, and
/// the balance snapshot fields ever change.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts one posting inside the caller-supplied atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if the amount is not a
    /// positive number of minor units, or a database error.
    pub async fn create_entry<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: CreateEntryInput,
    ) -> Result<ledger_entries::Model, LedgerError> {
        validate_amount(input.amount_minor_units)?;

        let now = Utc::now().into();
        let entry = ledger_entries::ActiveModel {
            id: Set(Uuid::now_v7()),
            trace_id: Set(input.trace_id),
            user_id: Set(input.user_id),
            account: Set(input.account.to_string()),
            entry_type: Set(input.entry_type.into()),
            category: Set(input.category.to_string()),
            subtype: Set(input.subtype),
            amount: Set(input.amount_minor_units),
            currency: Set(input.currency.to_string()),
            balance_before: Set(None),
            balance_after: Set(None),
            status: Set(input.status.into()),
            related_to: Set(input.related_to),
            idempotency_key: Set(input.idempotency_key),
            meta: Set(input.meta),
            created_at: Set(now),
            processed_at: Set(input.status.is_terminal().then_some(now)),
        };

        entry.insert(conn).await.map_err(db_err)
    }

    /// Inserts a DEBIT on `from_account` and a CREDIT on `to_account`
    /// with the same trace, amount, and category, cross-linked via
    /// `related_to`.
    ///
    /// This is the only sanctioned way to move value between two
    /// accounts: both legs are written in the caller's atomic unit, so a
    /// partial failure can never leave an unpaired posting behind.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for non-positive amounts,
    /// `LedgerError::SameAccount` when both legs name the same account,
    /// or a database error.
    pub async fn create_double_entry<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: DoubleEntryInput,
    ) -> Result<(ledger_entries::Model, ledger_entries::Model), LedgerError> {
        validate_amount(input.amount_minor_units)?;
        if input.from_account == input.to_account {
            return Err(LedgerError::SameAccount(input.from_account.to_string()));
        }

        let debit_id = Uuid::now_v7();
        let credit_id = Uuid::now_v7();
        let now = Utc::now().into();
        let processed_at = input.status.is_terminal().then_some(now);
        let status: sea_orm_active_enums::EntryStatus = input.status.into();

        let debit = ledger_entries::ActiveModel {
            id: Set(debit_id),
            trace_id: Set(input.trace_id),
            user_id: Set(input.user_id),
            account: Set(input.from_account.to_string()),
            entry_type: Set(sea_orm_active_enums::EntryType::Debit),
            category: Set(input.category.to_string()),
            subtype: Set(input.subtype.clone()),
            amount: Set(input.amount_minor_units),
            currency: Set(input.currency.to_string()),
            balance_before: Set(None),
            balance_after: Set(None),
            status: Set(status.clone()),
            related_to: Set(Some(credit_id)),
            idempotency_key: Set(None),
            meta: Set(input.meta.clone()),
            created_at: Set(now),
            processed_at: Set(processed_at),
        };

        let credit = ledger_entries::ActiveModel {
            id: Set(credit_id),
            trace_id: Set(input.trace_id),
            user_id: Set(input.user_id),
            account: Set(input.to_account.to_string()),
            entry_type: Set(sea_orm_active_enums::EntryType::Credit),
            category: Set(input.category.to_string()),
            subtype: Set(input.subtype),
            amount: Set(input.amount_minor_units),
            currency: Set(input.currency.to_string()),
            balance_before: Set(None),
            balance_after: Set(None),
            status: Set(status),
            related_to: Set(Some(debit_id)),
            idempotency_key: Set(None),
            meta: Set(input.meta),
            created_at: Set(now),
            processed_at: Set(processed_at),
        };

        let debit = debit.insert(conn).await.map_err(db_err)?;
        let credit = credit.insert(conn).await.map_err(db_err)?;
        Ok((debit, credit))
    }

    /// Transitions one entry `Pending -> {Completed, Failed}`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::EntryNotFound` for an unknown entry and
    /// `LedgerError::InvalidStateTransition` if the entry is already
    /// terminal.
    pub async fn update_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        entry_id: Uuid,
        new_status: EntryStatus,
    ) -> Result<ledger_entries::Model, LedgerError> {
        let entry = ledger_entries::Entity::find_by_id(entry_id)
            .one(conn)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;

        let current: EntryStatus = entry.status.clone().into();
        validate_transition(current, new_status)?;

        let mut active: ledger_entries::ActiveModel = entry.into();
        active.status = Set(new_status.into());
        active.processed_at = Set(Some(Utc::now().into()));
        active.update(conn).await.map_err(db_err)
    }

    /// Transitions every pending entry of a trace to `new_status`.
    ///
    /// Returns the number of entries transitioned.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::TraceNotFound` if the trace has no entries
    /// and `LedgerError::InvalidStateTransition` if none of them is
    /// still pending.
    pub async fn update_status_by_trace<C: ConnectionTrait>(
        &self,
        conn: &C,
        trace_id: Uuid,
        new_status: EntryStatus,
    ) -> Result<u64, LedgerError> {
        validate_transition(EntryStatus::Pending, new_status)?;

        let entries = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::TraceId.eq(trace_id))
            .all(conn)
            .await
            .map_err(db_err)?;
        if entries.is_empty() {
            return Err(LedgerError::TraceNotFound(trace_id));
        }

        let first: EntryStatus = entries[0].status.clone().into();
        if !entries
            .iter()
            .any(|entry| EntryStatus::from(entry.status.clone()) == EntryStatus::Pending)
        {
            return Err(LedgerError::InvalidStateTransition {
                from: first,
                to: new_status,
            });
        }

        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let result = ledger_entries::Entity::update_many()
            .col_expr(
                ledger_entries::Column::Status,
                Expr::value(sea_orm_active_enums::EntryStatus::from(new_status)),
            )
            .col_expr(ledger_entries::Column::ProcessedAt, Expr::value(Some(now)))
            .filter(ledger_entries::Column::TraceId.eq(trace_id))
            .filter(ledger_entries::Column::Status.eq(sea_orm_active_enums::EntryStatus::Pending))
            .exec(conn)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected)
    }

    /// All entries of a trace in creation order.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn get_by_trace_id(
        &self,
        trace_id: Uuid,
    ) -> Result<Vec<ledger_entries::Model>, LedgerError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::TraceId.eq(trace_id))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    /// Recent entries for a user, optionally restricted to a category.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        category: Option<LedgerCategory>,
        limit: u64,
    ) -> Result<Vec<ledger_entries::Model>, LedgerError> {
        let mut query = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::UserId.eq(user_id));
        if let Some(category) = category {
            query = query.filter(ledger_entries::Column::Category.eq(category.to_string()));
        }
        query
            .order_by_desc(ledger_entries::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    /// Runs the conservation audit over the whole ledger.
    ///
    /// Read-only and idempotent; findings are reported, never repaired.
    ///
    /// # Errors
    ///
    /// Returns a database error, or `LedgerError::Database` for a stored
    /// category that no longer parses.
    pub async fn find_inconsistencies(
        &self,
        stale_after: Duration,
    ) -> Result<Vec<Inconsistency>, LedgerError> {
        let models = ledger_entries::Entity::find()
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut records = Vec::with_capacity(models.len());
        for model in models {
            let category = LedgerCategory::from_str(&model.category)
                .map_err(LedgerError::Database)?;
            records.push(EntryRecord {
                id: model.id,
                trace_id: model.trace_id,
                entry_type: model.entry_type.into(),
                category,
                amount_minor_units: model.amount,
                status: model.status.into(),
                related_to: model.related_to,
                created_at: model.created_at.with_timezone(&Utc),
            });
        }

        let findings = audit_entries(&records, stale_after, Utc::now());
        for finding in &findings {
            tracing::warn!(
                trace_id = %finding.trace_id,
                reason = %finding.reason(),
                "ledger inconsistency detected"
            );
        }
        Ok(findings)
    }
}
