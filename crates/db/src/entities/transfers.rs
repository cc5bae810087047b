//! `SeaORM` Entity for the transfers table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::SettlementStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub trace_id: Uuid,
    pub user_id: Uuid,
    /// Destination ledger account key (intra) or bank account number (inter).
    pub counterparty: String,
    /// "intra" or "inter".
    pub transfer_type: String,
    pub amount: i64,
    pub currency: String,
    pub status: SettlementStatus,
    #[sea_orm(unique)]
    pub reference: String,
    pub provider_ref: Option<String>,
    pub session_id: Option<String>,
    pub narration: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub processed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
