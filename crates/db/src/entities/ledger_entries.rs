//! `SeaORM` Entity for the ledger_entries table.
//!
//! Append-only double-entry postings. Amount, account, and entry type
//! are immutable after insert; only status, processed_at, and the
//! balance snapshot fields may change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{EntryStatus, EntryType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub trace_id: Uuid,
    pub user_id: Option<Uuid>,
    pub account: String,
    pub entry_type: EntryType,
    pub category: String,
    pub subtype: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub balance_before: Option<i64>,
    pub balance_after: Option<i64>,
    pub status: EntryStatus,
    pub related_to: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub meta: Json,
    pub created_at: DateTimeWithTimeZone,
    pub processed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
