//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Amount is negative, overflows, or cannot be represented in minor units
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A bucket does not hold enough to cover the requested move
    #[error("Insufficient funds in {bucket} bucket: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Bucket name (pending, ready_for_payout, paid, ...)
        bucket: &'static str,
        /// Amount requested (minor units)
        requested: i64,
        /// Amount currently held (minor units)
        available: i64,
    },

    /// Status change not allowed by the transition table
    #[error("Invalid transition: cannot {action} from {from}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Attempted action or target status
        action: String,
    },

    /// Seller transaction not found
    #[error("Seller transaction not found: {0}")]
    TransactionNotFound(String),

    /// Financial transaction not found
    #[error("Financial transaction not found: {0}")]
    FinancialTransactionNotFound(String),

    /// Balance not found
    #[error("Balance not found: {0}")]
    BalanceNotFound(String),

    /// Invariant violation (bucket conservation, duplicate settlement, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
