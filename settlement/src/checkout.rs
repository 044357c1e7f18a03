//! Checkout lookup collaborator

use crate::error::Result;
use crate::types::{Checkout, CheckoutStatus};
use async_trait::async_trait;
use ledger_core::CheckoutId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read access to checkouts owned by the checkout service
#[async_trait]
pub trait CheckoutLookup: Send + Sync {
    /// Checkout by ID, if it exists
    async fn checkout(&self, id: &CheckoutId) -> Result<Option<Checkout>>;
}

/// In-memory checkout store
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckoutStore {
    checkouts: Arc<RwLock<HashMap<CheckoutId, Checkout>>>,
}

impl InMemoryCheckoutStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a checkout
    pub async fn insert(&self, checkout: Checkout) {
        self.checkouts.write().await.insert(checkout.id, checkout);
    }

    /// Flip a checkout's status; returns false if unknown
    pub async fn set_status(&self, id: &CheckoutId, status: CheckoutStatus) -> bool {
        match self.checkouts.write().await.get_mut(id) {
            Some(checkout) => {
                checkout.status = status;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CheckoutLookup for InMemoryCheckoutStore {
    async fn checkout(&self, id: &CheckoutId) -> Result<Option<Checkout>> {
        Ok(self.checkouts.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckoutTotals;
    use chrono::Utc;
    use ledger_core::{Currency, StoreId, TerritoryId, UserId};
    use rust_decimal::Decimal;

    fn checkout() -> Checkout {
        Checkout {
            id: CheckoutId::new_v4(),
            territory_id: TerritoryId::new_v4(),
            store_id: StoreId::new_v4(),
            buyer_id: UserId::new_v4(),
            seller_id: UserId::new_v4(),
            currency: Currency::USD,
            status: CheckoutStatus::PendingPayment,
            totals: CheckoutTotals {
                items_subtotal: Decimal::new(10_000, 2),
                platform_fee: Decimal::new(500, 2),
                grand_total: Decimal::new(10_000, 2),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_flip_status() {
        let store = InMemoryCheckoutStore::new();
        let c = checkout();
        let id = c.id;
        store.insert(c).await;

        assert!(store.set_status(&id, CheckoutStatus::Paid).await);
        let loaded = store.checkout(&id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CheckoutStatus::Paid);

        assert!(!store.set_status(&CheckoutId::new_v4(), CheckoutStatus::Paid).await);
        assert!(store.checkout(&CheckoutId::new_v4()).await.unwrap().is_none());
    }
}
