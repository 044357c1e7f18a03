//! Payout gateway capability
//!
//! Only the contract lives here; the wire protocol belongs to the gateway
//! adapter. [`mock::MockPayoutGateway`] is the in-process implementation.

pub mod mock;

use crate::error::GatewayError;
use crate::types::{PayoutRequest, PayoutStatus};
use async_trait::async_trait;
use ledger_core::PayoutId;

pub use mock::MockPayoutGateway;

/// External payout gateway
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Create a payout; returns the gateway's payout ID
    async fn create_payout(&self, request: &PayoutRequest) -> Result<PayoutId, GatewayError>;

    /// Current status of a payout
    async fn payout_status(&self, payout_id: &PayoutId) -> Result<PayoutStatus, GatewayError>;
}
