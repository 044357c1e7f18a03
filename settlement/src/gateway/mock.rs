use super::PayoutGateway;
use crate::error::GatewayError;
use crate::types::{PayoutRequest, PayoutStatus};
use async_trait::async_trait;
use ledger_core::PayoutId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Scriptable in-process payout gateway
///
/// New payouts start `Processing`. Calls carrying a `batch_key` already seen
/// return the existing payout instead of creating a second one.
#[derive(Debug, Clone, Default)]
pub struct MockPayoutGateway {
    latency_ms: u64,
    state: Arc<RwLock<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    payouts: HashMap<PayoutId, MockPayout>,
    by_batch_key: HashMap<String, PayoutId>,
    scripted_failures: VecDeque<GatewayError>,
    create_calls: usize,
}

#[derive(Debug, Clone)]
struct MockPayout {
    request: PayoutRequest,
    status: PayoutStatus,
}

impl MockPayoutGateway {
    /// Gateway with no latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated network latency per call
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Make the next create call fail with `error`
    pub async fn fail_next(&self, error: GatewayError) {
        self.state.write().await.scripted_failures.push_back(error);
    }

    /// Move a payout to `status` (as the real gateway would over time)
    pub async fn set_status(&self, payout_id: &PayoutId, status: PayoutStatus) -> bool {
        match self.state.write().await.payouts.get_mut(payout_id) {
            Some(payout) => {
                payout.status = status;
                true
            }
            None => false,
        }
    }

    /// Requests of every payout created (unordered)
    pub async fn requests(&self) -> Vec<PayoutRequest> {
        self.state
            .read()
            .await
            .payouts
            .values()
            .map(|p| p.request.clone())
            .collect()
    }

    /// Request of one payout
    pub async fn request(&self, payout_id: &PayoutId) -> Option<PayoutRequest> {
        self.state
            .read()
            .await
            .payouts
            .get(payout_id)
            .map(|p| p.request.clone())
    }

    /// Distinct payouts created
    pub async fn payout_count(&self) -> usize {
        self.state.read().await.payouts.len()
    }

    /// Create calls received, including failed and de-duplicated ones
    pub async fn create_calls(&self) -> usize {
        self.state.read().await.create_calls
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }
    }
}

#[async_trait]
impl PayoutGateway for MockPayoutGateway {
    async fn create_payout(&self, request: &PayoutRequest) -> Result<PayoutId, GatewayError> {
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        state.create_calls += 1;

        if let Some(error) = state.scripted_failures.pop_front() {
            warn!("Mock gateway: scripted failure: {}", error);
            return Err(error);
        }

        if request.amount_cents <= 0 {
            return Err(GatewayError::Rejected(format!(
                "amount must be positive, got {}",
                request.amount_cents
            )));
        }

        if let Some(existing) = request
            .batch_key()
            .and_then(|key| state.by_batch_key.get(key))
        {
            info!(payout_id = %existing, "Mock gateway: duplicate batch key, returning existing payout");
            return Ok(existing.clone());
        }

        let payout_id = PayoutId::new(format!("po_{}", Uuid::new_v4().simple()));
        if let Some(key) = request.batch_key() {
            state.by_batch_key.insert(key.to_string(), payout_id.clone());
        }
        state.payouts.insert(
            payout_id.clone(),
            MockPayout {
                request: request.clone(),
                status: PayoutStatus::Processing,
            },
        );

        info!(
            payout_id = %payout_id,
            amount_cents = request.amount_cents,
            currency = %request.currency,
            "Mock gateway: payout created"
        );

        Ok(payout_id)
    }

    async fn payout_status(&self, payout_id: &PayoutId) -> Result<PayoutStatus, GatewayError> {
        self.simulate_latency().await;

        self.state
            .read()
            .await
            .payouts
            .get(payout_id)
            .map(|p| p.status)
            .ok_or_else(|| GatewayError::NotFound(payout_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Currency, UserId};
    use std::collections::BTreeMap;

    fn request(batch_key: &str) -> PayoutRequest {
        let mut metadata = BTreeMap::new();
        metadata.insert(PayoutRequest::BATCH_KEY.to_string(), batch_key.to_string());
        PayoutRequest {
            amount_cents: 5_000,
            currency: Currency::USD,
            seller_account_id: UserId::new_v4(),
            description: "test".to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_create_and_status() {
        let gateway = MockPayoutGateway::new();
        let id = gateway.create_payout(&request("a")).await.unwrap();

        assert_eq!(
            gateway.payout_status(&id).await.unwrap(),
            PayoutStatus::Processing
        );
        assert!(gateway.set_status(&id, PayoutStatus::Completed).await);
        assert_eq!(
            gateway.payout_status(&id).await.unwrap(),
            PayoutStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_duplicate_batch_key_deduplicated() {
        let gateway = MockPayoutGateway::new();
        let first = gateway.create_payout(&request("same")).await.unwrap();
        let second = gateway.create_payout(&request("same")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.payout_count().await, 1);
        assert_eq!(gateway.create_calls().await, 2);
    }

    #[tokio::test]
    async fn test_scripted_failure_consumed_once() {
        let gateway = MockPayoutGateway::new();
        gateway
            .fail_next(GatewayError::Unavailable("maintenance".into()))
            .await;

        assert!(gateway.create_payout(&request("x")).await.is_err());
        assert!(gateway.create_payout(&request("x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_payout_status() {
        let gateway = MockPayoutGateway::new();
        let err = gateway
            .payout_status(&PayoutId::new("po_missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
