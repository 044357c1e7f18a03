//! Keyed async locks
//!
//! Serializes read-modify-write cycles on one balance, checkout or payout
//! across tasks. Callers that need several locks take them in the order
//! checkout → seller balance → platform balance.

use crate::balance::SellerBalanceKey;
use crate::types::{CheckoutId, Currency, PayoutId, TerritoryId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// What a lock protects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// Idempotent recording of one checkout
    Checkout(CheckoutId),
    /// One seller balance row
    SellerBalance(SellerBalanceKey),
    /// One platform balance row
    PlatformBalance(TerritoryId, Currency),
    /// Reconciliation of one payout
    Payout(PayoutId),
    /// Activation of a territory's configuration rows
    TerritoryConfig(TerritoryId),
}

/// Held lock; released on drop
pub type LockGuard = OwnedMutexGuard<()>;

/// Registry of per-key mutexes
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl LockRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn acquire(&self, key: LockKey) -> LockGuard {
        // Clone the mutex out so no map shard stays locked across the await
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Number of keys seen
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// No keys seen
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop mutexes nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let registry = Arc::new(LockRegistry::new());
        let key = LockKey::Checkout(CheckoutId::new_v4());

        let guard = registry.acquire(key.clone()).await;

        let contender = {
            let registry = registry.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = registry.acquire(key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let registry = LockRegistry::new();
        let _a = registry.acquire(LockKey::Payout(PayoutId::new("po_a"))).await;
        let _b = registry.acquire(LockKey::Payout(PayoutId::new("po_b"))).await;
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let registry = LockRegistry::new();
        let held = registry.acquire(LockKey::Payout(PayoutId::new("held"))).await;
        drop(registry.acquire(LockKey::Payout(PayoutId::new("free"))).await);

        registry.prune();
        assert_eq!(registry.len(), 1);
        drop(held);
    }
}
