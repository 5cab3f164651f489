use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Domain-level errors returned by the ledger core.
///
/// Every failure a caller can act on is a distinct variant; transport-level
/// concerns (CSV parsing, IO, storage backends) are folded in at the bottom
/// so the binary can surface them without a second error type.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("affiliate {0} not found")]
    AffiliateNotFound(u64),
    #[error("order {0} not found")]
    OrderNotFound(u64),
    #[error("withdrawal {0} not found")]
    WithdrawalNotFound(u64),
    #[error("identity {0} is already registered")]
    DuplicateIdentity(i64),
    #[error("invalid pricing: {0}")]
    InvalidPricing(String),
    #[error("order rate limit reached")]
    RateLimited,
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),
    #[error("a pending withdrawal already exists for this affiliate")]
    DuplicatePending,
    #[error("amount {amount} is below the minimum withdrawal of {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    /// The entity is already in a terminal state. Carries that state's
    /// display name so admin surfaces can report what happened first.
    #[error("already processed ({status})")]
    AlreadyProcessed { status: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}
