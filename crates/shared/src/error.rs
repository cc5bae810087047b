//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Amount is non-positive, non-integer, or out of range.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// An idempotency record already exists for the (key, principal) pair.
    ///
    /// This is a programming error: callers must check before saving.
    #[error("Duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    /// Attempted to move a ledger entry or settlement record out of a
    /// terminal state.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Principal does not own the resource.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (e.g., duplicate reference from an idempotent replay window).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External provider is unreachable or the circuit breaker is open.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Ledger audit detected an inconsistency. Reported, never auto-repaired.
    #[error("Ledger inconsistency: {0}")]
    Inconsistency(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount(_) | Self::Validation(_) => 400,
            Self::Unauthorized(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) | Self::DuplicateIdempotencyKey(_) => 409,
            Self::InvalidStateTransition(_) => 422,
            Self::ProviderUnavailable(_) => 503,
            Self::Inconsistency(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::DuplicateIdempotencyKey(_) => "DUPLICATE_IDEMPOTENCY_KEY",
            Self::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::Inconsistency(_) => "LEDGER_INCONSISTENCY",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if a caller may safely retry with the same
    /// idempotency key.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::InvalidAmount(String::new()).status_code(), 400);
        assert_eq!(AppError::Validation(String::new()).status_code(), 400);
        assert_eq!(AppError::Unauthorized(String::new()).status_code(), 403);
        assert_eq!(AppError::NotFound(String::new()).status_code(), 404);
        assert_eq!(AppError::Conflict(String::new()).status_code(), 409);
        assert_eq!(
            AppError::DuplicateIdempotencyKey(String::new()).status_code(),
            409
        );
        assert_eq!(
            AppError::InvalidStateTransition(String::new()).status_code(),
            422
        );
        assert_eq!(
            AppError::ProviderUnavailable(String::new()).status_code(),
            503
        );
        assert_eq!(AppError::Inconsistency(String::new()).status_code(), 500);
        assert_eq!(AppError::Database(String::new()).status_code(), 500);
        assert_eq!(AppError::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::InvalidAmount(String::new()).error_code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            AppError::DuplicateIdempotencyKey(String::new()).error_code(),
            "DUPLICATE_IDEMPOTENCY_KEY"
        );
        assert_eq!(
            AppError::InvalidStateTransition(String::new()).error_code(),
            "INVALID_STATE_TRANSITION"
        );
        assert_eq!(
            AppError::Unauthorized(String::new()).error_code(),
            "UNAUTHORIZED"
        );
        assert_eq!(AppError::NotFound(String::new()).error_code(), "NOT_FOUND");
        assert_eq!(AppError::Conflict(String::new()).error_code(), "CONFLICT");
        assert_eq!(
            AppError::ProviderUnavailable(String::new()).error_code(),
            "PROVIDER_UNAVAILABLE"
        );
        assert_eq!(
            AppError::Inconsistency(String::new()).error_code(),
            "LEDGER_INCONSISTENCY"
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::InvalidAmount("amount must be positive".into()).to_string(),
            "Invalid amount: amount must be positive"
        );
        assert_eq!(
            AppError::Unauthorized("msg".into()).to_string(),
            "Unauthorized: msg"
        );
        assert_eq!(
            AppError::ProviderUnavailable("circuit open".into()).to_string(),
            "Provider unavailable: circuit open"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::ProviderUnavailable(String::new()).is_retryable());
        assert!(AppError::Database(String::new()).is_retryable());
        assert!(!AppError::InvalidAmount(String::new()).is_retryable());
        assert!(!AppError::Unauthorized(String::new()).is_retryable());
    }
}
