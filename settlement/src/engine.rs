//! Main settlement engine
//!
//! Wires the recorder, eligibility gate, batcher and reconciler onto one
//! ledger and exposes the operations collaborators call.

use crate::{
    audit::AuditLogger,
    batcher::PayoutBatcher,
    checkout::CheckoutLookup,
    config::Config,
    eligibility::PayoutEligibilityGate,
    fees::FeeCalculator,
    gateway::PayoutGateway,
    metrics::SettlementMetrics,
    recorder::SettlementRecorder,
    reconciler::PayoutStatusReconciler,
    retry::RetryStrategy,
    scheduler::PayoutScheduler,
    types::*,
    Error, Result,
};
use chrono::{DateTime, Utc};
use ledger_core::{
    Actor, CheckoutId, FeeConfig, FeeMode, ItemType, Ledger, PayoutConfigDraft, PayoutId,
    SellerTransaction, TerritoryId, TerritoryPayoutConfig,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Settlement engine
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    /// Ledger core
    ledger: Arc<Ledger>,

    /// Fee lookup
    fees: FeeCalculator,

    /// Paid checkout recording
    recorder: SettlementRecorder,

    /// Pending → ready promotion
    gate: PayoutEligibilityGate,

    /// Payout batching
    batcher: PayoutBatcher,

    /// Gateway outcome reconciliation
    reconciler: PayoutStatusReconciler,

    /// Settlement metrics
    metrics: SettlementMetrics,

    /// Configuration
    config: Config,
}

impl SettlementEngine {
    /// Open the ledger at `config.ledger` and build the engine on it
    pub fn open(
        config: Config,
        checkouts: Arc<dyn CheckoutLookup>,
        gateway: Arc<dyn PayoutGateway>,
        audit: Arc<dyn AuditLogger>,
    ) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(Ledger::open(config.ledger.clone())?);
        Self::with_ledger(ledger, config, checkouts, gateway, audit)
    }

    /// Build the engine on an already open ledger
    pub fn with_ledger(
        ledger: Arc<Ledger>,
        config: Config,
        checkouts: Arc<dyn CheckoutLookup>,
        gateway: Arc<dyn PayoutGateway>,
        audit: Arc<dyn AuditLogger>,
    ) -> Result<Self> {
        let metrics = SettlementMetrics::new()
            .map_err(|e| Error::Other(format!("Failed to register metrics: {}", e)))?;
        let retry = RetryStrategy::new(config.gateway.retry.clone(), config.gateway.timeout());

        let fees = FeeCalculator::new(ledger.clone());
        let recorder = SettlementRecorder::new(
            ledger.clone(),
            checkouts,
            audit.clone(),
            metrics.clone(),
        );
        let gate = PayoutEligibilityGate::new(ledger.clone(), audit.clone(), metrics.clone());
        let batcher = PayoutBatcher::new(
            ledger.clone(),
            gateway.clone(),
            retry.clone(),
            audit.clone(),
            metrics.clone(),
        );
        let reconciler =
            PayoutStatusReconciler::new(ledger.clone(), gateway, retry, audit, metrics.clone());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            data_dir = %config.ledger.data_dir.display(),
            "Settlement engine ready"
        );

        Ok(Self {
            ledger,
            fees,
            recorder,
            gate,
            batcher,
            reconciler,
            metrics,
            config,
        })
    }

    /// Record a checkout that has just been paid
    pub async fn record_paid_checkout(&self, checkout_id: CheckoutId) -> Result<RecordOutcome> {
        self.recorder.record_paid_checkout(checkout_id).await
    }

    /// Run a payout batch for one territory
    pub async fn process_pending_payouts(
        &self,
        territory: &TerritoryId,
        actor: Actor,
    ) -> Result<PayoutRunReport> {
        self.batcher.process_pending_payouts(territory, actor).await
    }

    /// Apply the gateway's current status of a payout
    pub async fn reconcile(&self, payout_id: &PayoutId) -> Result<ReconcileOutcome> {
        self.reconciler.reconcile(payout_id).await
    }

    /// Administrative cancel of a Pending or ReadyForPayout transaction
    pub async fn cancel_transaction(
        &self,
        transaction_id: Uuid,
        actor: Actor,
        reason: &str,
    ) -> Result<SellerTransaction> {
        self.recorder
            .cancel_transaction(transaction_id, actor, reason)
            .await
    }

    /// Re-evaluate one transaction for payout eligibility
    pub async fn try_promote(&self, transaction_id: Uuid, now: DateTime<Utc>) -> Result<Promotion> {
        self.gate.try_promote(transaction_id, now).await
    }

    /// Eligibility sweep over a territory's Pending transactions
    pub async fn sweep(&self, territory: &TerritoryId, now: DateTime<Utc>) -> Result<usize> {
        self.gate.sweep(territory, now).await
    }

    /// Checkout totals for a set of lines
    pub fn quote(&self, territory: &TerritoryId, lines: &[CheckoutLine]) -> Result<CheckoutTotals> {
        self.fees.quote(territory, lines)
    }

    /// Platform fee for one line
    pub fn fee(
        &self,
        territory: &TerritoryId,
        item_type: &ItemType,
        line_subtotal: Decimal,
        quantity: u32,
    ) -> Result<Decimal> {
        self.fees.fee(territory, item_type, line_subtotal, quantity)
    }

    /// Replace a territory's payout configuration
    pub async fn activate_payout_config(
        &self,
        territory: TerritoryId,
        draft: PayoutConfigDraft,
        actor: Actor,
    ) -> Result<TerritoryPayoutConfig> {
        Ok(self
            .ledger
            .activate_payout_config(territory, draft, actor)
            .await?)
    }

    /// Replace the fee for one item type in a territory
    pub async fn activate_fee_config(
        &self,
        territory: TerritoryId,
        item_type: ItemType,
        mode: FeeMode,
        actor: Actor,
    ) -> Result<FeeConfig> {
        Ok(self
            .ledger
            .activate_fee_config(territory, item_type, mode, actor)
            .await?)
    }

    /// Scheduler driving sweeps and automatic payouts on this engine
    pub fn scheduler(&self) -> PayoutScheduler {
        PayoutScheduler::new(
            self.ledger.clone(),
            self.gate.clone(),
            self.batcher.clone(),
            self.config.scheduler.sweep_interval(),
        )
    }

    /// Underlying ledger
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Settlement metrics
    pub fn metrics(&self) -> &SettlementMetrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
