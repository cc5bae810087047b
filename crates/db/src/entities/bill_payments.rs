//! `SeaORM` Entity for the bill_payments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::SettlementStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "bill_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub trace_id: Uuid,
    pub user_id: Uuid,
    /// Biller slug, e.g. "dstv" or "ikedc-prepaid".
    pub biller: String,
    /// Customer identifier at the biller (meter number, smartcard, ...).
    pub customer_ref: String,
    pub amount: i64,
    pub fee: i64,
    pub currency: String,
    pub status: SettlementStatus,
    #[sea_orm(unique)]
    pub reference: String,
    pub provider_ref: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub processed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
