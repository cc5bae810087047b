//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application. Methods that must join an orchestrator's atomic unit
//! take any `ConnectionTrait` impl, so they run inside the caller's
//! transaction or against the plain connection.

pub mod bill_payment;
pub mod idempotency;
pub mod ledger;
pub mod loan;
pub mod outbox;
pub mod savings;
pub mod transfer;

pub use bill_payment::{BillPaymentError, BillPaymentRepository, CreateBillPaymentInput};
pub use idempotency::{IdempotencyError, IdempotencyRepository};
pub use ledger::{CreateEntryInput, DoubleEntryInput, LedgerRepository};
pub use loan::{CreateLoanApplicationInput, LoanError, LoanRepository};
pub use outbox::{OutboxError, OutboxRepository};
pub use savings::{CreateSavingsTransactionInput, SavingsError, SavingsRepository};
pub use transfer::{CreateTransferInput, TransferError, TransferRepository};
