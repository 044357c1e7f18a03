//! Marketplace Ledger Core
//!
//! Durable records of money owed to sellers and the platform, backed by RocksDB.
//!
//! # Architecture
//!
//! - **Atomic units of work**: every operation stages its writes in a [`UnitOfWork`]
//!   and commits them as one RocksDB write batch
//! - **Transition table**: seller transaction status changes go through one chokepoint
//! - **Keyed locks**: read-modify-write on a balance is serialized per key
//! - **Versioned configuration**: config rows are deactivated, never edited or deleted
//!
//! # Invariants
//!
//! - `gross == fee + net` for every seller transaction
//! - Balance buckets never go negative; mutators take non-negative deltas only
//! - At most one seller transaction per checkout
//! - Status history is append-only

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod balance;
pub mod config;
pub mod error;
pub mod financial;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod storage;
pub mod territory;
pub mod transaction;
pub mod types;

// Re-exports
pub use balance::{PlatformFinancialBalance, SellerBalance, SellerBalanceKey};
pub use config::Config;
pub use error::{Error, Result};
pub use financial::{
    FinancialReference, FinancialTransaction, FinancialTransactionKind,
    FinancialTransactionStatus, PlatformExpenseTransaction, PlatformRevenueTransaction,
    TransactionStatusHistory,
};
pub use ledger::{BalanceAudit, ExpectedBuckets, Ledger};
pub use locks::{LockGuard, LockKey, LockRegistry};
pub use storage::{Storage, UnitOfWork};
pub use territory::{
    FeeConfig, FeeMode, ItemType, PayoutConfigDraft, PayoutFrequency, TerritoryPayoutConfig,
};
pub use transaction::{SellerTransaction, SellerTransactionStatus, TransactionAction};
pub use types::{
    cents_from_decimal, decimal_from_cents, Actor, CheckoutId, Currency, PayoutId, StoreId,
    TerritoryId, UserId,
};
