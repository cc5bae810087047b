//! External provider gateway contract.
//!
//! The provider is the bank-transfer rail behind transfers and bill
//! payments. All calls carry a bounded timeout, run outside any store
//! transaction, and are wrapped by the circuit breaker.

pub mod breaker;
pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use client::{GuardedGateway, HttpProviderGateway};

/// Errors from the provider gateway.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level failure.
    #[error("Provider request failed: {0}")]
    Http(String),

    /// The request exceeded its bounded timeout.
    #[error("Provider request timed out")]
    Timeout,

    /// The circuit breaker is open; no network attempt was made.
    #[error("Circuit breaker is open")]
    CircuitOpen,

    /// The provider returned a response we could not parse.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider rejected the request.
    #[error("Provider rejected request ({code}): {message}")]
    Api {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },
}

impl From<ProviderError> for settla_shared::AppError {
    fn from(err: ProviderError) -> Self {
        Self::ProviderUnavailable(err.to_string())
    }
}

/// Kind of transfer being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    /// Both legs are wallets inside the platform's bank.
    Intra,
    /// Destination is an account at another bank.
    Inter,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intra => write!(f, "intra"),
            Self::Inter => write!(f, "inter"),
        }
    }
}

/// A transfer dispatch request.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    /// Source account number.
    pub from_account: String,
    /// Destination account number.
    pub to_account: String,
    /// Amount in minor units.
    pub amount_minor_units: i64,
    /// Unique, externally visible reference.
    pub reference: String,
    /// Free-text remark shown on statements.
    pub remark: Option<String>,
    /// Intra- or inter-bank.
    pub transfer_type: TransferKind,
}

/// Terminal interpretation of a provider status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// `"00"`: the transfer settled.
    Settled,
    /// `"FAILED"`: terminal failure.
    Failed,
    /// Anything else: still in flight.
    Pending,
}

impl ProviderOutcome {
    /// Maps a raw provider status code to its interpretation.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "00" => Self::Settled,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Provider receipt for a dispatched or queried transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReceipt {
    /// Raw provider status code.
    pub status: String,
    /// Provider transaction ID.
    pub txn_id: Option<String>,
    /// Provider session ID.
    pub session_id: Option<String>,
}

impl ProviderReceipt {
    /// Interprets the receipt's status code.
    #[must_use]
    pub fn outcome(&self) -> ProviderOutcome {
        ProviderOutcome::from_code(&self.status)
    }
}

/// Balance enquiry result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Available balance in minor units.
    pub balance_minor_units: i64,
    /// Account number queried.
    pub account_no: String,
}

/// The external provider contract consumed by orchestrators and pollers.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Dispatches a transfer.
    async fn transfer(&self, request: &TransferRequest) -> Result<ProviderReceipt, ProviderError>;

    /// Queries the status of a previously dispatched transfer.
    async fn query_transfer(&self, reference: &str) -> Result<ProviderReceipt, ProviderError>;

    /// Fetches the balance of a provider-side account.
    async fn account_balance(&self, account_no: &str) -> Result<AccountBalance, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(ProviderOutcome::from_code("00"), ProviderOutcome::Settled);
        assert_eq!(
            ProviderOutcome::from_code("FAILED"),
            ProviderOutcome::Failed
        );
        assert_eq!(ProviderOutcome::from_code("09"), ProviderOutcome::Pending);
        assert_eq!(ProviderOutcome::from_code(""), ProviderOutcome::Pending);
        assert_eq!(
            ProviderOutcome::from_code("PROCESSING"),
            ProviderOutcome::Pending
        );
    }

    #[test]
    fn test_receipt_outcome() {
        let receipt = ProviderReceipt {
            status: "00".to_string(),
            txn_id: Some("TXN123".to_string()),
            session_id: None,
        };
        assert_eq!(receipt.outcome(), ProviderOutcome::Settled);
    }

    #[test]
    fn test_transfer_kind_display() {
        assert_eq!(TransferKind::Intra.to_string(), "intra");
        assert_eq!(TransferKind::Inter.to_string(), "inter");
    }

    #[test]
    fn test_provider_error_maps_to_app_error() {
        let err: settla_shared::AppError = ProviderError::CircuitOpen.into();
        assert_eq!(err.error_code(), "PROVIDER_UNAVAILABLE");
        assert_eq!(err.status_code(), 503);
    }
}
