//! Double-entry bookkeeping domain.
//!
//! This module implements the core ledger functionality:
//! - Entry types, statuses, and categories
//! - Account keys for internal money pools and user wallets
//! - Status transition rules
//! - The inconsistency audit (conservation of value)

pub mod audit;
pub mod entry;
pub mod error;
pub mod validation;

#[cfg(test)]
mod audit_props;

pub use audit::{EntryRecord, Inconsistency, InconsistencyKind, audit_entries};
pub use entry::{Account, EntryStatus, EntryType, LedgerCategory};
pub use error::LedgerError;
pub use validation::{validate_amount, validate_transition};
