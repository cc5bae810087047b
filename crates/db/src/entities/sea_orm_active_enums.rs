//! String-backed enums shared by the entities.
//!
//! Stored as short uppercase strings so the same schema runs on Postgres
//! and on SQLite in tests. Conversions to and from the `settla-core`
//! domain enums live here so the rest of the crate never matches on raw
//! strings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use settla_core::ledger::{EntryStatus as CoreEntryStatus, EntryType as CoreEntryType};
use settla_core::settlement::SettlementStatus as CoreSettlementStatus;

/// Ledger entry type.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum EntryType {
    /// Value leaves the account.
    #[sea_orm(string_value = "DEBIT")]
    Debit,
    /// Value enters the account.
    #[sea_orm(string_value = "CREDIT")]
    Credit,
}

impl From<CoreEntryType> for EntryType {
    fn from(value: CoreEntryType) -> Self {
        match value {
            CoreEntryType::Debit => Self::Debit,
            CoreEntryType::Credit => Self::Credit,
        }
    }
}

impl From<EntryType> for CoreEntryType {
    fn from(value: EntryType) -> Self {
        match value {
            EntryType::Debit => Self::Debit,
            EntryType::Credit => Self::Credit,
        }
    }
}

/// Ledger entry lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum EntryStatus {
    /// Posted but not yet settled.
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Settled.
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Terminally failed.
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl From<CoreEntryStatus> for EntryStatus {
    fn from(value: CoreEntryStatus) -> Self {
        match value {
            CoreEntryStatus::Pending => Self::Pending,
            CoreEntryStatus::Completed => Self::Completed,
            CoreEntryStatus::Failed => Self::Failed,
        }
    }
}

impl From<EntryStatus> for CoreEntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Pending => Self::Pending,
            EntryStatus::Completed => Self::Completed,
            EntryStatus::Failed => Self::Failed,
        }
    }
}

/// Domain settlement record status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SettlementStatus {
    /// Awaiting settlement.
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Claimed by a reconciliation worker.
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    /// Settled.
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// Terminally failed and refunded.
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl From<CoreSettlementStatus> for SettlementStatus {
    fn from(value: CoreSettlementStatus) -> Self {
        match value {
            CoreSettlementStatus::Pending => Self::Pending,
            CoreSettlementStatus::Processing => Self::Processing,
            CoreSettlementStatus::Completed => Self::Completed,
            CoreSettlementStatus::Failed => Self::Failed,
        }
    }
}

impl From<SettlementStatus> for CoreSettlementStatus {
    fn from(value: SettlementStatus) -> Self {
        match value {
            SettlementStatus::Pending => Self::Pending,
            SettlementStatus::Processing => Self::Processing,
            SettlementStatus::Completed => Self::Completed,
            SettlementStatus::Failed => Self::Failed,
        }
    }
}

/// Savings transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SavingsKind {
    /// Wallet to savings pool.
    #[sea_orm(string_value = "DEPOSIT")]
    Deposit,
    /// Savings pool back to wallet.
    #[sea_orm(string_value = "WITHDRAWAL")]
    Withdrawal,
    /// Interest pool payout.
    #[sea_orm(string_value = "INTEREST")]
    Interest,
}

/// Loan application lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum LoanStatus {
    /// Submitted, not yet reviewed.
    #[sea_orm(string_value = "APPLIED")]
    Applied,
    /// Approved, awaiting disbursement.
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    /// Principal disbursed to the wallet.
    #[sea_orm(string_value = "DISBURSED")]
    Disbursed,
    /// Rejected.
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}
