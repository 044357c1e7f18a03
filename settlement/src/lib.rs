//! Settlement Engine
//!
//! Turns paid marketplace checkouts into seller and platform ledger records
//! and drives the money owed to sellers through retention, batching and payout.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! 1. **Recording**: a paid checkout becomes a seller transaction, a balance
//!    credit and a platform revenue record ([`SettlementRecorder`])
//! 2. **Eligibility**: once retention elapses and the minimum is reached the
//!    transaction moves to ReadyForPayout ([`PayoutEligibilityGate`])
//! 3. **Batching**: ready transactions are grouped per seller and currency and
//!    sent to the payout gateway ([`PayoutBatcher`])
//! 4. **Reconciliation**: gateway outcomes are applied back onto every
//!    transaction of the payout ([`PayoutStatusReconciler`])
//!
//! Every step commits one atomic unit of work to the ledger.
//!
//! # Example
//!
//! ```no_run
//! use settlement::{
//!     Config, InMemoryCheckoutStore, MockPayoutGateway, SettlementEngine, TracingAuditLogger,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> settlement::Result<()> {
//!     let engine = SettlementEngine::open(
//!         Config::default(),
//!         Arc::new(InMemoryCheckoutStore::new()),
//!         Arc::new(MockPayoutGateway::new()),
//!         Arc::new(TracingAuditLogger),
//!     )?;
//!
//!     let territory = ledger_core::TerritoryId::new_v4();
//!     let report = engine
//!         .process_pending_payouts(&territory, ledger_core::Actor::System)
//!         .await?;
//!     println!("Created {} payouts", report.payouts_created());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod audit;
pub mod batcher;
pub mod checkout;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod fees;
pub mod gateway;
pub mod metrics;
pub mod reconciler;
pub mod recorder;
pub mod retry;
pub mod scheduler;
pub mod types;

// Re-exports
pub use audit::{AuditAction, AuditEntry, AuditLogger, MemoryAuditLogger, TracingAuditLogger};
pub use batcher::{partition_greedy, Partition, PayoutBatcher};
pub use checkout::{CheckoutLookup, InMemoryCheckoutStore};
pub use config::{Config, GatewayConfig, SchedulerConfig};
pub use eligibility::PayoutEligibilityGate;
pub use engine::SettlementEngine;
pub use error::{Error, GatewayError, Result};
pub use fees::FeeCalculator;
pub use gateway::{MockPayoutGateway, PayoutGateway};
pub use metrics::SettlementMetrics;
pub use reconciler::PayoutStatusReconciler;
pub use recorder::{SettlementAmounts, SettlementRecorder};
pub use retry::{RetryConfig, RetryStrategy};
pub use scheduler::{PayoutScheduler, TickReport};
pub use types::*;
