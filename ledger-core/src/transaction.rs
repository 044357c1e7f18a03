//! Seller transactions and their status machine
//!
//! ```text
//! Pending ──MarkReady──▶ ReadyForPayout ──StartPayout──▶ ProcessingPayout ──CompletePayout──▶ Paid
//!    │                        │                                  └──────FailPayout─────────▶ Failed
//!    └──Cancel──▶ Canceled ◀──┘
//! ```
//!
//! Every status change goes through [`SellerTransactionStatus::apply`]; anything
//! not in the table is rejected with [`Error::InvalidTransition`].

use crate::types::{CheckoutId, Currency, PayoutId, StoreId, TerritoryId, UserId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Seller transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SellerTransactionStatus {
    /// Created, funds held for retention
    Pending = 1,
    /// Retention cleared, eligible for the next payout batch
    ReadyForPayout = 2,
    /// Included in a payout sent to the gateway
    ProcessingPayout = 3,
    /// Payout confirmed (terminal)
    Paid = 4,
    /// Payout failed (terminal)
    Failed = 5,
    /// Canceled before payout (terminal)
    Canceled = 6,
}

/// Action that drives a seller transaction status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    /// Retention elapsed and minimum reached
    MarkReady,
    /// Included in a payout
    StartPayout,
    /// Gateway confirmed the payout
    CompletePayout,
    /// Gateway reported the payout failed
    FailPayout,
    /// Canceled before payout
    Cancel,
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionAction::MarkReady => "mark ready",
            TransactionAction::StartPayout => "start payout",
            TransactionAction::CompletePayout => "complete payout",
            TransactionAction::FailPayout => "fail payout",
            TransactionAction::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

impl SellerTransactionStatus {
    /// Transition table: current status + action → next status
    pub fn apply(self, action: TransactionAction) -> Result<Self> {
        use SellerTransactionStatus::*;
        use TransactionAction::*;

        match (self, action) {
            (Pending, MarkReady) => Ok(ReadyForPayout),
            (ReadyForPayout, StartPayout) => Ok(ProcessingPayout),
            (ProcessingPayout, CompletePayout) => Ok(Paid),
            (ProcessingPayout, FailPayout) => Ok(Failed),
            (Pending, Cancel) | (ReadyForPayout, Cancel) => Ok(Canceled),
            (from, action) => Err(Error::InvalidTransition {
                from: from.to_string(),
                action: action.to_string(),
            }),
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SellerTransactionStatus::Paid
                | SellerTransactionStatus::Failed
                | SellerTransactionStatus::Canceled
        )
    }
}

impl fmt::Display for SellerTransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SellerTransactionStatus::Pending => "Pending",
            SellerTransactionStatus::ReadyForPayout => "ReadyForPayout",
            SellerTransactionStatus::ProcessingPayout => "ProcessingPayout",
            SellerTransactionStatus::Paid => "Paid",
            SellerTransactionStatus::Failed => "Failed",
            SellerTransactionStatus::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}

/// Money owed to a seller for one paid checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerTransaction {
    /// Transaction ID (UUIDv7, time-ordered)
    pub id: Uuid,

    /// Territory the sale happened in
    pub territory_id: TerritoryId,

    /// Store that sold the items
    pub store_id: StoreId,

    /// Checkout this transaction settles (unique)
    pub checkout_id: CheckoutId,

    /// Seller (store owner) user
    pub seller_id: UserId,

    /// Buyer-paid subtotal (minor units)
    pub gross_amount_cents: i64,

    /// Platform fee (minor units)
    pub platform_fee_cents: i64,

    /// gross − fee, unclamped (may be negative)
    pub net_amount_cents: i64,

    /// Currency
    pub currency: Currency,

    /// Current status
    pub status: SellerTransactionStatus,

    /// Payout covering this transaction
    pub payout_id: Option<PayoutId>,

    /// Seller-side financial transaction
    pub financial_transaction_id: Uuid,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Promoted to ReadyForPayout
    pub ready_at: Option<DateTime<Utc>>,

    /// Payout confirmed
    pub paid_at: Option<DateTime<Utc>>,

    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl SellerTransaction {
    /// Amount credited to the seller balance: net clamped at zero
    pub fn payable_cents(&self) -> i64 {
        self.net_amount_cents.max(0)
    }

    /// Check `gross == fee + net`
    pub fn amounts_reconcile(&self) -> bool {
        self.platform_fee_cents.checked_add(self.net_amount_cents) == Some(self.gross_amount_cents)
    }

    /// Promote to ReadyForPayout
    pub fn mark_ready(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.apply(TransactionAction::MarkReady)?;
        self.ready_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Attach to a payout
    pub fn start_payout(&mut self, payout_id: PayoutId, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.apply(TransactionAction::StartPayout)?;
        self.payout_id = Some(payout_id);
        self.updated_at = now;
        Ok(())
    }

    /// Payout confirmed by the gateway
    pub fn complete_payout(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.apply(TransactionAction::CompletePayout)?;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Payout failed at the gateway
    pub fn fail_payout(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.apply(TransactionAction::FailPayout)?;
        self.updated_at = now;
        Ok(())
    }

    /// Cancel before payout
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.apply(TransactionAction::Cancel)?;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Currency;

    pub(crate) fn sample_transaction(net: i64) -> SellerTransaction {
        let now = Utc::now();
        SellerTransaction {
            id: Uuid::now_v7(),
            territory_id: TerritoryId::new_v4(),
            store_id: StoreId::new_v4(),
            checkout_id: CheckoutId::new_v4(),
            seller_id: UserId::new_v4(),
            gross_amount_cents: net + 500,
            platform_fee_cents: 500,
            net_amount_cents: net,
            currency: Currency::USD,
            status: SellerTransactionStatus::Pending,
            payout_id: None,
            financial_transaction_id: Uuid::now_v7(),
            created_at: now,
            ready_at: None,
            paid_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_happy_path() {
        let mut tx = sample_transaction(10_000);
        let now = Utc::now();

        tx.mark_ready(now).unwrap();
        assert_eq!(tx.status, SellerTransactionStatus::ReadyForPayout);
        assert_eq!(tx.ready_at, Some(now));

        tx.start_payout(PayoutId::new("po_1"), now).unwrap();
        assert_eq!(tx.status, SellerTransactionStatus::ProcessingPayout);

        tx.complete_payout(now).unwrap();
        assert_eq!(tx.status, SellerTransactionStatus::Paid);
        assert!(tx.paid_at.is_some());
        assert!(tx.status.is_terminal());
    }

    #[test]
    fn test_complete_payout_requires_processing() {
        let mut tx = sample_transaction(10_000);
        assert!(tx.complete_payout(Utc::now()).is_err());
        assert_eq!(tx.status, SellerTransactionStatus::Pending);

        tx.mark_ready(Utc::now()).unwrap();
        let err = tx.complete_payout(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(tx.status, SellerTransactionStatus::ReadyForPayout);
    }

    #[test]
    fn test_cancel_only_before_payout() {
        let mut pending = sample_transaction(100);
        pending.cancel(Utc::now()).unwrap();
        assert_eq!(pending.status, SellerTransactionStatus::Canceled);

        let mut ready = sample_transaction(100);
        ready.mark_ready(Utc::now()).unwrap();
        ready.cancel(Utc::now()).unwrap();
        assert_eq!(ready.status, SellerTransactionStatus::Canceled);

        let mut paid = sample_transaction(100);
        paid.mark_ready(Utc::now()).unwrap();
        paid.start_payout(PayoutId::new("po_2"), Utc::now()).unwrap();
        paid.complete_payout(Utc::now()).unwrap();
        assert!(paid.cancel(Utc::now()).is_err());
        assert_eq!(paid.status, SellerTransactionStatus::Paid);
    }

    #[test]
    fn test_no_backward_transitions() {
        use SellerTransactionStatus::*;
        assert!(ReadyForPayout.apply(TransactionAction::MarkReady).is_err());
        assert!(ProcessingPayout.apply(TransactionAction::MarkReady).is_err());
        assert!(Failed.apply(TransactionAction::StartPayout).is_err());
        assert!(Canceled.apply(TransactionAction::MarkReady).is_err());
    }

    #[test]
    fn test_payable_clamps_negative_net() {
        let tx = sample_transaction(-250);
        assert_eq!(tx.net_amount_cents, -250);
        assert_eq!(tx.payable_cents(), 0);
        assert!(tx.amounts_reconcile());
    }
}
