//! Ledger error types for validation and state errors.

use thiserror::Error;
use uuid::Uuid;

use super::entry::EntryStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Entry amount must be a positive number of minor units.
    #[error("Entry amount must be positive, got {0}")]
    InvalidAmount(i64),

    /// Attempted to transition an entry out of a terminal status.
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current status.
        from: EntryStatus,
        /// Requested status.
        to: EntryStatus,
    },

    /// A double entry must move value between two distinct accounts.
    #[error("Double entry requires distinct accounts, got {0}")]
    SameAccount(String),

    /// Entry not found.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(Uuid),

    /// No entries exist for the trace.
    #[error("No ledger entries for trace: {0}")]
    TraceNotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<LedgerError> for settla_shared::AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount(_) => Self::InvalidAmount(err.to_string()),
            LedgerError::InvalidStateTransition { .. } => {
                Self::InvalidStateTransition(err.to_string())
            }
            LedgerError::SameAccount(_) => Self::Validation(err.to_string()),
            LedgerError::EntryNotFound(_) | LedgerError::TraceNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            LedgerError::Database(msg) => Self::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LedgerError::InvalidAmount(0).to_string(),
            "Entry amount must be positive, got 0"
        );
        let err = LedgerError::InvalidStateTransition {
            from: EntryStatus::Completed,
            to: EntryStatus::Failed,
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition from Completed to Failed"
        );
    }

    #[test]
    fn test_maps_to_app_error() {
        use settla_shared::AppError;

        let err: AppError = LedgerError::InvalidAmount(-5).into();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");

        let err: AppError = LedgerError::InvalidStateTransition {
            from: EntryStatus::Failed,
            to: EntryStatus::Completed,
        }
        .into();
        assert_eq!(err.error_code(), "INVALID_STATE_TRANSITION");

        let err: AppError = LedgerError::EntryNotFound(Uuid::nil()).into();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
