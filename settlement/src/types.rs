//! Core types for settlement engine

use chrono::{DateTime, Utc};
use ledger_core::{CheckoutId, Currency, ItemType, PayoutId, StoreId, TerritoryId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Checkout status as reported by the checkout service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutStatus {
    /// Cart converted, awaiting payment
    PendingPayment,
    /// Payment captured
    Paid,
    /// Abandoned or canceled by the buyer
    Canceled,
    /// Refunded after payment
    Refunded,
}

impl fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutStatus::PendingPayment => "PendingPayment",
            CheckoutStatus::Paid => "Paid",
            CheckoutStatus::Canceled => "Canceled",
            CheckoutStatus::Refunded => "Refunded",
        };
        f.write_str(name)
    }
}

/// Pre-computed checkout totals (major units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    /// Sum of line subtotals
    pub items_subtotal: Decimal,

    /// Sum of line fees
    pub platform_fee: Decimal,

    /// Amount charged to the buyer
    pub grand_total: Decimal,
}

/// One store's share of a cart, as seen by settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    /// Checkout ID
    pub id: CheckoutId,

    /// Territory
    pub territory_id: TerritoryId,

    /// Store selling the items
    pub store_id: StoreId,

    /// Buyer
    pub buyer_id: UserId,

    /// Store owner receiving the money
    pub seller_id: UserId,

    /// Currency
    pub currency: Currency,

    /// Current status
    pub status: CheckoutStatus,

    /// Totals
    pub totals: CheckoutTotals,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Cart line used to quote fees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    /// Listing item type
    pub item_type: ItemType,

    /// Price per unit (major units)
    pub unit_price: Decimal,

    /// Units
    pub quantity: u32,
}

impl CheckoutLine {
    /// unit price × quantity
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Gateway-owned payout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Accepted, not started
    Pending,
    /// Transfer in progress
    Processing,
    /// Money delivered
    Completed,
    /// Transfer failed
    Failed,
    /// Canceled at the gateway
    Canceled,
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayoutStatus::Pending => "Pending",
            PayoutStatus::Processing => "Processing",
            PayoutStatus::Completed => "Completed",
            PayoutStatus::Failed => "Failed",
            PayoutStatus::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}

/// Create-payout call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Amount (minor units)
    pub amount_cents: i64,

    /// Currency
    pub currency: Currency,

    /// Seller receiving the money
    pub seller_account_id: UserId,

    /// Human-readable description
    pub description: String,

    /// Free-form metadata (always carries `batch_key`)
    pub metadata: BTreeMap<String, String>,
}

impl PayoutRequest {
    /// Metadata key identifying one sub-batch across retries
    pub const BATCH_KEY: &'static str = "batch_key";

    /// Batch key, if present
    pub fn batch_key(&self) -> Option<&str> {
        self.metadata.get(Self::BATCH_KEY).map(String::as_str)
    }
}

/// Result of recording a paid checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New records written
    Recorded {
        /// Seller transaction created
        transaction_id: Uuid,
        /// Promoted to ReadyForPayout in the same unit of work
        promoted: bool,
    },
    /// Checkout was already settled; nothing written
    AlreadyRecorded {
        /// Existing seller transaction
        transaction_id: Uuid,
    },
}

impl RecordOutcome {
    /// Seller transaction for the checkout
    pub fn transaction_id(&self) -> Uuid {
        match self {
            RecordOutcome::Recorded { transaction_id, .. }
            | RecordOutcome::AlreadyRecorded { transaction_id } => *transaction_id,
        }
    }
}

/// Why a transaction was not promoted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    /// Territory has no active payout configuration
    NoActiveConfig,
    /// Retention window still running
    RetentionRunning {
        /// When it ends
        eligible_at: DateTime<Utc>,
    },
    /// ready + net below the minimum payout
    BelowMinimum {
        /// ready + net
        projected_cents: i64,
        /// Configured minimum
        minimum_cents: i64,
    },
    /// Transaction is not Pending
    NotPending,
}

/// Eligibility decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Moved to ReadyForPayout
    Promoted,
    /// Left Pending
    NotYetEligible(Ineligibility),
}

impl Promotion {
    /// Whether the transaction was promoted
    pub fn is_promoted(&self) -> bool {
        matches!(self, Promotion::Promoted)
    }
}

/// Payout issued during a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPayout {
    /// Gateway payout ID
    pub payout_id: PayoutId,
    /// Seller paid
    pub seller_id: UserId,
    /// Currency
    pub currency: Currency,
    /// Amount (minor units)
    pub amount_cents: i64,
    /// Covered seller transactions, in arrival order
    pub transaction_ids: Vec<Uuid>,
}

/// Sub-batch the gateway (or the commit after it) refused
#[derive(Debug, Clone)]
pub struct PayoutFailure {
    /// Seller
    pub seller_id: UserId,
    /// Currency
    pub currency: Currency,
    /// Amount (minor units)
    pub amount_cents: i64,
    /// Transactions left ReadyForPayout
    pub transaction_ids: Vec<Uuid>,
    /// Error text
    pub error: String,
}

/// Group waiting for more transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    /// Seller
    pub seller_id: UserId,
    /// Currency
    pub currency: Currency,
    /// Sum of the group
    pub total_cents: i64,
    /// Configured minimum
    pub minimum_cents: i64,
}

/// Outcome of one `process_pending_payouts` run
#[derive(Debug, Clone, Default)]
pub struct PayoutRunReport {
    /// Payouts created
    pub payouts: Vec<CreatedPayout>,
    /// Sub-batches that failed
    pub failures: Vec<PayoutFailure>,
    /// Groups below the minimum
    pub skipped: Vec<SkippedGroup>,
    /// Single transactions above the maximum payout
    pub oversized: Vec<Uuid>,
}

impl PayoutRunReport {
    /// Number of payouts created
    pub fn payouts_created(&self) -> usize {
        self.payouts.len()
    }
}

/// Outcome of reconciling one payout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Gateway still working; nothing written
    NoChange(PayoutStatus),
    /// Local records moved to match the gateway
    Applied {
        /// Gateway status applied
        status: PayoutStatus,
        /// Transactions moved
        transitioned: usize,
        /// Transactions already in the target status
        unchanged: usize,
    },
}
