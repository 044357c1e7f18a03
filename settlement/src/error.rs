//! Error types for settlement engine

use crate::types::CheckoutStatus;
use ledger_core::{CheckoutId, PayoutId};
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Checkout lookup returned nothing
    #[error("Checkout not found: {0}")]
    CheckoutNotFound(CheckoutId),

    /// Checkout exists but is not paid
    #[error("Checkout {checkout_id} not paid (status {status})")]
    CheckoutNotPaid {
        /// Checkout
        checkout_id: CheckoutId,
        /// Observed status
        status: CheckoutStatus,
    },

    /// No local transaction references the payout
    #[error("Unknown payout: {0}")]
    UnknownPayout(PayoutId),

    /// Payout gateway error
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Amount could not be converted or is out of range
    #[error("Invalid amount: {0}")]
    Amount(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
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

/// Payout gateway errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Call did not finish in time
    #[error("gateway timeout: {0}")]
    Timeout(String),

    /// Gateway temporarily unreachable
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// Request refused (bad account, limits, ...)
    #[error("payout rejected: {0}")]
    Rejected(String),

    /// Gateway does not know the payout
    #[error("payout not found at gateway: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// Worth calling again
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout(_) | GatewayError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::Timeout("5s".into()).is_retryable());
        assert!(GatewayError::Unavailable("503".into()).is_retryable());
        assert!(!GatewayError::Rejected("closed account".into()).is_retryable());
        assert!(!GatewayError::NotFound("po_1".into()).is_retryable());
    }

    #[test]
    fn test_ledger_error_wraps() {
        let err: Error = ledger_core::Error::InvalidAmount("x".into()).into();
        assert!(matches!(err, Error::Ledger(_)));
    }
}
