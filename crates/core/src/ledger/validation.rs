//! Business rule validation for ledger operations.

use settla_shared::types::money::is_valid_amount;

use super::entry::EntryStatus;
use super::error::LedgerError;

/// Validates that an amount is a positive number of minor units.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` for zero or negative amounts.
pub const fn validate_amount(amount_minor_units: i64) -> Result<(), LedgerError> {
    if is_valid_amount(amount_minor_units) {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount_minor_units))
    }
}

/// Validates an entry status transition.
///
/// The only legal moves are `Pending -> Completed` and `Pending -> Failed`.
/// Terminal entries never change status again.
///
/// # Errors
///
/// Returns `LedgerError::InvalidStateTransition` otherwise.
pub fn validate_transition(from: EntryStatus, to: EntryStatus) -> Result<(), LedgerError> {
    match (from, to) {
        (EntryStatus::Pending, EntryStatus::Completed | EntryStatus::Failed) => Ok(()),
        _ => Err(LedgerError::InvalidStateTransition { from, to }),
    }
}
