//! Ledger entry domain types.

use serde::{Deserialize, Serialize};
use settla_shared::types::UserId;

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    /// Debit entry (value leaves the account).
    Debit,
    /// Credit entry (value enters the account).
    Credit,
}

impl EntryType {
    /// Returns the signed amount for conservation checks: debits are
    /// positive, credits negative.
    #[must_use]
    pub const fn signed(self, amount_minor_units: i64) -> i64 {
        match self {
            Self::Debit => amount_minor_units,
            Self::Credit => -amount_minor_units,
        }
    }
}

/// Lifecycle status of a ledger entry.
///
/// Status only moves `Pending -> {Completed, Failed}`, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    /// Posted but not yet settled.
    Pending,
    /// Settled; counts toward conservation of value.
    Completed,
    /// Terminally failed; paired with a compensating refund entry.
    Failed,
}

impl EntryStatus {
    /// Returns true if the entry can no longer change status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Business category of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerCategory {
    /// Bill payment to an external biller.
    BillPayment,
    /// Wallet-to-wallet or outbound bank transfer.
    Transfer,
    /// Loan disbursement or repayment.
    Loan,
    /// Savings pool movement.
    Savings,
    /// Platform fee.
    Fee,
    /// Compensating refund of a failed operation.
    Refund,
    /// Provider settlement leg.
    Settlement,
    /// Funds held pending an external outcome.
    Escrow,
}

impl std::fmt::Display for LedgerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BillPayment => "bill-payment",
            Self::Transfer => "transfer",
            Self::Loan => "loan",
            Self::Savings => "savings",
            Self::Fee => "fee",
            Self::Refund => "refund",
            Self::Settlement => "settlement",
            Self::Escrow => "escrow",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LedgerCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bill-payment" => Ok(Self::BillPayment),
            "transfer" => Ok(Self::Transfer),
            "loan" => Ok(Self::Loan),
            "savings" => Ok(Self::Savings),
            "fee" => Ok(Self::Fee),
            "refund" => Ok(Self::Refund),
            "settlement" => Ok(Self::Settlement),
            "escrow" => Ok(Self::Escrow),
            _ => Err(format!("Unknown ledger category: {s}")),
        }
    }
}

/// Internal account key a ledger entry posts against.
///
/// Rendered as a stable string key in storage, e.g. `user_wallet:<id>`,
/// `provider:<name>`, `platform_revenue`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Account {
    /// A user's wallet.
    UserWallet(UserId),
    /// An external provider's settlement account.
    Provider(String),
    /// Platform fee revenue.
    PlatformRevenue,
    /// Pooled user savings.
    SavingsPool,
    /// Interest payable pool.
    InterestPool,
    /// Loan disbursement pool.
    LoanPool,
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserWallet(id) => write!(f, "user_wallet:{id}"),
            Self::Provider(name) => write!(f, "provider:{name}"),
            Self::PlatformRevenue => write!(f, "platform_revenue"),
            Self::SavingsPool => write!(f, "savings_pool"),
            Self::InterestPool => write!(f, "interest_pool"),
            Self::LoanPool => write!(f, "loan_pool"),
        }
    }
}

impl std::str::FromStr for Account {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("user_wallet:") {
            let user = id
                .parse()
                .map_err(|_| format!("Invalid user wallet account: {s}"))?;
            return Ok(Self::UserWallet(user));
        }
        if let Some(name) = s.strip_prefix("provider:") {
            if name.is_empty() {
                return Err(format!("Invalid provider account: {s}"));
            }
            return Ok(Self::Provider(name.to_string()));
        }
        match s {
            "platform_revenue" => Ok(Self::PlatformRevenue),
            "savings_pool" => Ok(Self::SavingsPool),
            "interest_pool" => Ok(Self::InterestPool),
            "loan_pool" => Ok(Self::LoanPool),
            _ => Err(format!("Unknown account key: {s}")),
        }
    }
}
