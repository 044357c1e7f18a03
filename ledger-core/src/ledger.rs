//! Main ledger orchestration layer
//!
//! This module ties together storage, locks, and metrics into the API the
//! settlement services build on: atomic commits, keyed locks, typed reads,
//! and the versioned configuration repositories.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config)?;
//!
//!     // let mut unit = ledger_core::UnitOfWork::new();
//!     // ...
//!     // ledger.commit(unit)?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    balance::{PlatformFinancialBalance, SellerBalance, SellerBalanceKey},
    financial::{
        FinancialTransaction, PlatformExpenseTransaction, PlatformRevenueTransaction,
        TransactionStatusHistory,
    },
    locks::{LockGuard, LockKey, LockRegistry},
    metrics::Metrics,
    storage::{Storage, StorageStats, UnitOfWork},
    territory::{FeeConfig, FeeMode, ItemType, PayoutConfigDraft, TerritoryPayoutConfig},
    transaction::{SellerTransaction, SellerTransactionStatus},
    types::{Actor, CheckoutId, Currency, PayoutId, TerritoryId, UserId},
    Config, Error, Result,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main ledger interface
#[derive(Debug, Clone)]
pub struct Ledger {
    storage: Arc<Storage>,
    locks: Arc<LockRegistry>,
    metrics: Metrics,
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Other(format!("Failed to register metrics: {}", e)))?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            "Ledger opened"
        );

        Ok(Self {
            storage,
            locks: Arc::new(LockRegistry::new()),
            metrics,
            config,
        })
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ledger metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Locks

    /// Acquire a keyed lock
    pub async fn lock(&self, key: LockKey) -> LockGuard {
        self.locks.acquire(key).await
    }

    /// Lock a checkout for recording
    pub async fn lock_checkout(&self, checkout: CheckoutId) -> LockGuard {
        self.lock(LockKey::Checkout(checkout)).await
    }

    /// Lock a seller balance
    pub async fn lock_seller_balance(&self, key: SellerBalanceKey) -> LockGuard {
        self.lock(LockKey::SellerBalance(key)).await
    }

    /// Lock a platform balance
    pub async fn lock_platform_balance(
        &self,
        territory: TerritoryId,
        currency: Currency,
    ) -> LockGuard {
        self.lock(LockKey::PlatformBalance(territory, currency)).await
    }

    /// Lock a payout for reconciliation
    pub async fn lock_payout(&self, payout: PayoutId) -> LockGuard {
        self.lock(LockKey::Payout(payout)).await
    }

    /// Release lock entries nobody holds
    pub fn prune_locks(&self) {
        self.locks.prune();
    }

    // Writes

    /// Apply a unit of work atomically
    pub fn commit(&self, unit: UnitOfWork) -> Result<()> {
        let writes = unit.len();
        let start = Instant::now();

        match self.storage.commit(unit) {
            Ok(()) => {
                self.metrics
                    .record_commit(writes, start.elapsed().as_secs_f64());
                Ok(())
            }
            Err(e) => {
                self.metrics.record_failure();
                tracing::error!(error = %e, writes, "Commit failed");
                Err(e)
            }
        }
    }

    // Reads

    /// Seller transaction by id
    pub fn seller_transaction(&self, id: Uuid) -> Result<SellerTransaction> {
        self.storage
            .seller_transaction(id)?
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))
    }

    /// Seller transaction settling a checkout, if recorded
    pub fn seller_transaction_for_checkout(
        &self,
        checkout: &CheckoutId,
    ) -> Result<Option<SellerTransaction>> {
        match self.storage.seller_transaction_id_for_checkout(checkout)? {
            Some(id) => self.storage.seller_transaction(id),
            None => Ok(None),
        }
    }

    /// Transactions of a territory in one status, in arrival order
    pub fn seller_transactions_by_status(
        &self,
        territory: &TerritoryId,
        status: SellerTransactionStatus,
    ) -> Result<Vec<SellerTransaction>> {
        self.storage.seller_transactions_by_status(territory, status)
    }

    /// All transactions of a seller in a territory
    pub fn seller_transactions_by_seller(
        &self,
        territory: &TerritoryId,
        seller: &UserId,
    ) -> Result<Vec<SellerTransaction>> {
        self.storage.seller_transactions_by_seller(territory, seller)
    }

    /// Transactions covered by a payout
    pub fn seller_transactions_by_payout(&self, payout: &PayoutId) -> Result<Vec<SellerTransaction>> {
        self.storage.seller_transactions_by_payout(payout)
    }

    /// Stored seller balance
    pub fn seller_balance(&self, key: &SellerBalanceKey) -> Result<Option<SellerBalance>> {
        self.storage.seller_balance(key)
    }

    /// Stored platform balance
    pub fn platform_balance(
        &self,
        territory: &TerritoryId,
        currency: &Currency,
    ) -> Result<Option<PlatformFinancialBalance>> {
        self.storage.platform_balance(territory, currency)
    }

    /// Financial transaction by id
    pub fn financial_transaction(&self, id: Uuid) -> Result<FinancialTransaction> {
        self.storage
            .financial_transaction(id)?
            .ok_or_else(|| Error::FinancialTransactionNotFound(id.to_string()))
    }

    /// Status history of a financial transaction, oldest first
    pub fn status_history(&self, ft_id: Uuid) -> Result<Vec<TransactionStatusHistory>> {
        self.storage.status_history(ft_id)
    }

    /// Platform revenue recorded for a checkout
    pub fn platform_revenue_for_checkout(
        &self,
        checkout: &CheckoutId,
    ) -> Result<Option<PlatformRevenueTransaction>> {
        self.storage.platform_revenue_for_checkout(checkout)
    }

    /// Platform expenses recorded for a payout
    pub fn platform_expenses_for_payout(
        &self,
        payout: &PayoutId,
    ) -> Result<Vec<PlatformExpenseTransaction>> {
        self.storage.platform_expenses_for_payout(payout)
    }

    /// Payout-side financial transaction of a payout
    pub fn payout_financial_transaction(
        &self,
        payout: &PayoutId,
    ) -> Result<Option<FinancialTransaction>> {
        match self.storage.payout_financial_transaction_id(payout)? {
            Some(id) => self.storage.financial_transaction(id),
            None => Ok(None),
        }
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    // Configuration repositories

    /// Replace a territory's payout configuration
    ///
    /// The previous active row is deactivated in the same unit of work.
    pub async fn activate_payout_config(
        &self,
        territory: TerritoryId,
        draft: PayoutConfigDraft,
        actor: Actor,
    ) -> Result<TerritoryPayoutConfig> {
        draft.validate()?;
        let _guard = self.lock(LockKey::TerritoryConfig(territory)).await;
        let now = Utc::now();

        let mut unit = UnitOfWork::new();
        if let Some(mut previous) = self.storage.active_payout_config(&territory)? {
            previous.deactivate(now);
            unit.put_payout_config(&previous)?;
        }

        let config = TerritoryPayoutConfig::from_draft(territory, draft, actor, now);
        unit.put_payout_config(&config)?;
        self.commit(unit)?;

        tracing::info!(
            territory_id = %territory,
            config_id = %config.id,
            actor = %config.created_by,
            "Payout config activated"
        );

        Ok(config)
    }

    /// Active payout configuration of a territory
    pub fn active_payout_config(
        &self,
        territory: &TerritoryId,
    ) -> Result<Option<TerritoryPayoutConfig>> {
        Ok(self
            .storage
            .active_payout_config(territory)?
            .filter(|config| config.is_active))
    }

    /// Every payout configuration row of a territory, oldest first
    pub fn payout_config_history(
        &self,
        territory: &TerritoryId,
    ) -> Result<Vec<TerritoryPayoutConfig>> {
        self.storage.payout_config_history(territory)
    }

    /// Territories with an active payout configuration
    pub fn territories_with_payout_config(&self) -> Result<Vec<TerritoryId>> {
        self.storage.territories_with_payout_config()
    }

    /// Replace the fee configuration of (territory, item type)
    pub async fn activate_fee_config(
        &self,
        territory: TerritoryId,
        item_type: ItemType,
        mode: FeeMode,
        actor: Actor,
    ) -> Result<FeeConfig> {
        mode.validate()?;
        let _guard = self.lock(LockKey::TerritoryConfig(territory)).await;
        let now = Utc::now();

        let mut unit = UnitOfWork::new();
        if let Some(mut previous) = self.storage.active_fee_config(&territory, &item_type)? {
            previous.deactivate(now);
            unit.put_fee_config(&previous)?;
        }

        let config = FeeConfig::new(territory, item_type, mode, actor, now);
        unit.put_fee_config(&config)?;
        self.commit(unit)?;

        tracing::info!(
            territory_id = %territory,
            item_type = %config.item_type,
            config_id = %config.id,
            "Fee config activated"
        );

        Ok(config)
    }

    /// Active fee configuration of (territory, item type)
    pub fn active_fee_config(
        &self,
        territory: &TerritoryId,
        item_type: &ItemType,
    ) -> Result<Option<FeeConfig>> {
        Ok(self
            .storage
            .active_fee_config(territory, item_type)?
            .filter(|config| config.is_active))
    }

    // Audits

    /// Recompute a seller balance from its transactions and compare with the stored row
    ///
    /// Failed payouts stay in `paid`: money leaves the ready bucket when a payout starts
    /// and is not returned automatically.
    pub fn verify_seller_balance(&self, key: &SellerBalanceKey) -> Result<BalanceAudit> {
        let mut expected = ExpectedBuckets::default();

        for tx in self
            .storage
            .seller_transactions_by_seller(&key.territory_id, &key.seller_id)?
            .into_iter()
            .filter(|tx| tx.currency == key.currency)
        {
            let amount = tx.payable_cents();
            match tx.status {
                SellerTransactionStatus::Pending => expected.pending_cents += amount,
                SellerTransactionStatus::ReadyForPayout => {
                    expected.ready_for_payout_cents += amount
                }
                SellerTransactionStatus::ProcessingPayout
                | SellerTransactionStatus::Paid
                | SellerTransactionStatus::Failed => expected.paid_cents += amount,
                SellerTransactionStatus::Canceled => {}
            }
        }

        Ok(BalanceAudit {
            key: *key,
            expected,
            stored: self.storage.seller_balance(key)?,
        })
    }
}

/// Bucket totals derived from transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedBuckets {
    /// Pending
    pub pending_cents: i64,
    /// Ready for payout
    pub ready_for_payout_cents: i64,
    /// Paid (includes in-flight and failed payouts)
    pub paid_cents: i64,
}

/// Result of [`Ledger::verify_seller_balance`]
#[derive(Debug, Clone)]
pub struct BalanceAudit {
    /// Audited balance
    pub key: SellerBalanceKey,
    /// Totals recomputed from transactions
    pub expected: ExpectedBuckets,
    /// Stored row, if any
    pub stored: Option<SellerBalance>,
}

impl BalanceAudit {
    /// Stored buckets match the recomputed ones (a missing row must be all zero)
    pub fn is_consistent(&self) -> bool {
        match &self.stored {
            Some(balance) => {
                balance.pending_cents == self.expected.pending_cents
                    && balance.ready_for_payout_cents == self.expected.ready_for_payout_cents
                    && balance.paid_cents == self.expected.paid_cents
            }
            None => self.expected == ExpectedBuckets::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::territory::PayoutFrequency;
    use crate::transaction::tests::sample_transaction;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn create_test_ledger() -> (Ledger, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.sync_writes = false;

        (Ledger::open(config).unwrap(), temp_dir)
    }

    fn draft(minimum: i64) -> PayoutConfigDraft {
        PayoutConfigDraft {
            retention_period_days: 7,
            minimum_payout_amount_cents: minimum,
            maximum_payout_amount_cents: None,
            frequency: PayoutFrequency::Weekly,
            auto_payout: true,
            approval_required: false,
            currency: Currency::USD,
        }
    }

    #[tokio::test]
    async fn test_ledger_open() {
        let (ledger, _temp) = create_test_ledger();
        assert_eq!(ledger.metrics().commits_total.get(), 0);
    }

    #[tokio::test]
    async fn test_payout_config_replacement_keeps_history() {
        let (ledger, _temp) = create_test_ledger();
        let territory = TerritoryId::new_v4();

        let first = ledger
            .activate_payout_config(territory, draft(10_000), Actor::System)
            .await
            .unwrap();
        let second = ledger
            .activate_payout_config(territory, draft(20_000), Actor::System)
            .await
            .unwrap();

        let active = ledger.active_payout_config(&territory).unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.minimum_payout_amount_cents, 20_000);

        let history = ledger.payout_config_history(&territory).unwrap();
        assert_eq!(history.len(), 2);
        let old = history.iter().find(|c| c.id == first.id).unwrap();
        assert!(!old.is_active);
        assert!(old.deactivated_at.is_some());

        assert_eq!(ledger.territories_with_payout_config().unwrap(), vec![territory]);
    }

    #[tokio::test]
    async fn test_invalid_payout_config_rejected() {
        let (ledger, _temp) = create_test_ledger();
        let territory = TerritoryId::new_v4();
        let mut bad = draft(10_000);
        bad.maximum_payout_amount_cents = Some(1_000);

        assert!(ledger
            .activate_payout_config(territory, bad, Actor::System)
            .await
            .is_err());
        assert!(ledger.active_payout_config(&territory).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fee_config_replacement() {
        let (ledger, _temp) = create_test_ledger();
        let territory = TerritoryId::new_v4();
        let item = ItemType::new("product");

        ledger
            .activate_fee_config(
                territory,
                item.clone(),
                FeeMode::Fixed { amount: Decimal::new(150, 2) },
                Actor::System,
            )
            .await
            .unwrap();
        ledger
            .activate_fee_config(
                territory,
                item.clone(),
                FeeMode::Percentage { rate: Decimal::new(5, 2) },
                Actor::System,
            )
            .await
            .unwrap();

        let active = ledger.active_fee_config(&territory, &item).unwrap().unwrap();
        assert_eq!(active.mode, FeeMode::Percentage { rate: Decimal::new(5, 2) });
        assert!(ledger
            .active_fee_config(&territory, &ItemType::new("service"))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_verify_seller_balance() {
        let (ledger, _temp) = create_test_ledger();
        let tx = sample_transaction(4_000);
        let key = SellerBalanceKey::new(tx.territory_id, tx.seller_id, tx.currency);

        let mut balance = SellerBalance::new(key, Utc::now());
        balance.add_pending(tx.payable_cents(), Utc::now()).unwrap();

        let mut unit = UnitOfWork::new();
        unit.insert_seller_transaction(&tx).unwrap();
        unit.put_seller_balance(&balance).unwrap();
        ledger.commit(unit).unwrap();

        let audit = ledger.verify_seller_balance(&key).unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.expected.pending_cents, 4_000);
        assert_eq!(ledger.metrics().commits_total.get(), 1);

        // Drift the stored row
        balance.add_pending(1, Utc::now()).unwrap();
        let mut unit = UnitOfWork::new();
        unit.put_seller_balance(&balance).unwrap();
        ledger.commit(unit).unwrap();
        assert!(!ledger.verify_seller_balance(&key).unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_missing_transaction_is_not_found() {
        let (ledger, _temp) = create_test_ledger();
        let err = ledger.seller_transaction(Uuid::now_v7()).unwrap_err();
        assert!(matches!(err, Error::TransactionNotFound(_)));
    }
}
