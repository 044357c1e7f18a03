//! Settlement metrics
//!
//! - `settlement_checkouts_recorded_total` - Paid checkouts turned into ledger records
//! - `settlement_transactions_promoted_total` - Transactions moved to ReadyForPayout
//! - `settlement_transactions_canceled_total` - Transactions canceled by operators
//! - `settlement_payouts_created_total` - Payouts issued at the gateway
//! - `settlement_payout_failures_total` - Sub-batches that failed
//! - `settlement_payouts_reconciled_total` - Payout outcomes applied locally

use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct SettlementMetrics {
    /// Checkouts recorded
    pub checkouts_recorded_total: IntCounter,

    /// Transactions promoted
    pub transactions_promoted_total: IntCounter,

    /// Transactions canceled
    pub transactions_canceled_total: IntCounter,

    /// Payouts created
    pub payouts_created_total: IntCounter,

    /// Payout failures
    pub payout_failures_total: IntCounter,

    /// Payouts reconciled
    pub payouts_reconciled_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for SettlementMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementMetrics")
            .field("checkouts_recorded_total", &self.checkouts_recorded_total.get())
            .field("payouts_created_total", &self.payouts_created_total.get())
            .finish()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl SettlementMetrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        Ok(Self {
            checkouts_recorded_total: counter(
                &registry,
                "settlement_checkouts_recorded_total",
                "Paid checkouts turned into ledger records",
            )?,
            transactions_promoted_total: counter(
                &registry,
                "settlement_transactions_promoted_total",
                "Transactions moved to ReadyForPayout",
            )?,
            transactions_canceled_total: counter(
                &registry,
                "settlement_transactions_canceled_total",
                "Transactions canceled by operators",
            )?,
            payouts_created_total: counter(
                &registry,
                "settlement_payouts_created_total",
                "Payouts issued at the gateway",
            )?,
            payout_failures_total: counter(
                &registry,
                "settlement_payout_failures_total",
                "Payout sub-batches that failed",
            )?,
            payouts_reconciled_total: counter(
                &registry,
                "settlement_payouts_reconciled_total",
                "Payout outcomes applied locally",
            )?,
            registry,
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
