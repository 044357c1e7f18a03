//! Ledger-agnostic audit records
//!
//! A [`FinancialTransaction`] mirrors one side of a money movement (seller share,
//! platform fee, or payout). Its status changes are validated here and each one
//! yields a [`TransactionStatusHistory`] row; history is append-only.

use crate::types::{Actor, CheckoutId, Currency, PayoutId, TerritoryId, UserId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which side of the ledger a financial transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinancialTransactionKind {
    /// Seller share of a checkout
    Seller,
    /// Platform fee of a checkout
    PlatformFee,
    /// Transfer to a seller
    Payout,
}

/// Financial transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinancialTransactionStatus {
    /// Recorded, not yet moving
    Pending,
    /// Part of a payout in flight
    Processing,
    /// Settled
    Paid,
    /// Payout failed
    Failed,
    /// Canceled
    Canceled,
}

impl FinancialTransactionStatus {
    /// Allowed status changes
    pub fn can_transition_to(self, next: FinancialTransactionStatus) -> bool {
        use FinancialTransactionStatus::*;

        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Paid)
                | (Pending, Canceled)
                | (Processing, Paid)
                | (Processing, Failed)
                | (Processing, Canceled)
        )
    }
}

impl fmt::Display for FinancialTransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FinancialTransactionStatus::Pending => "Pending",
            FinancialTransactionStatus::Processing => "Processing",
            FinancialTransactionStatus::Paid => "Paid",
            FinancialTransactionStatus::Failed => "Failed",
            FinancialTransactionStatus::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}

/// Entity that originated a financial transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinancialReference {
    /// A seller transaction
    SellerTransaction(Uuid),
    /// A platform revenue transaction
    PlatformRevenue(Uuid),
    /// A gateway payout
    Payout(PayoutId),
}

/// Audit record for one side of a money movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialTransaction {
    /// ID (UUIDv7)
    pub id: Uuid,
    /// Ledger side
    pub kind: FinancialTransactionKind,
    /// Amount (minor units)
    pub amount_cents: i64,
    /// Currency
    pub currency: Currency,
    /// Free-text description
    pub description: String,
    /// Originating entity
    pub reference: FinancialReference,
    /// Linked financial transactions
    pub related_transaction_ids: Vec<Uuid>,
    /// Current status
    pub status: FinancialTransactionStatus,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl FinancialTransaction {
    /// Create a financial transaction together with its first history row
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        kind: FinancialTransactionKind,
        amount_cents: i64,
        currency: Currency,
        description: impl Into<String>,
        reference: FinancialReference,
        initial_status: FinancialTransactionStatus,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> (Self, TransactionStatusHistory) {
        let transaction = Self {
            id: Uuid::now_v7(),
            kind,
            amount_cents,
            currency,
            description: description.into(),
            reference,
            related_transaction_ids: Vec::new(),
            status: initial_status,
            created_at: now,
            updated_at: now,
        };
        let history = TransactionStatusHistory {
            id: Uuid::now_v7(),
            financial_transaction_id: transaction.id,
            previous_status: None,
            new_status: initial_status,
            actor,
            reason: "created".to_string(),
            recorded_at: now,
        };
        (transaction, history)
    }

    /// Link another financial transaction (idempotent)
    pub fn link(&mut self, other: Uuid) {
        if !self.related_transaction_ids.contains(&other) {
            self.related_transaction_ids.push(other);
        }
    }

    /// Validated status change; the returned row must be persisted with the transaction
    pub fn transition(
        &mut self,
        next: FinancialTransactionStatus,
        actor: Actor,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<TransactionStatusHistory> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                action: format!("move to {}", next),
            });
        }

        let history = TransactionStatusHistory {
            id: Uuid::now_v7(),
            financial_transaction_id: self.id,
            previous_status: Some(self.status),
            new_status: next,
            actor,
            reason: reason.into(),
            recorded_at: now,
        };
        self.status = next;
        self.updated_at = now;
        Ok(history)
    }
}

/// Append-only status change record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatusHistory {
    /// Row ID (UUIDv7, orders rows per transaction)
    pub id: Uuid,
    /// Financial transaction this row belongs to
    pub financial_transaction_id: Uuid,
    /// Status before the change (None for the creation row)
    pub previous_status: Option<FinancialTransactionStatus>,
    /// Status after the change
    pub new_status: FinancialTransactionStatus,
    /// Who caused it
    pub actor: Actor,
    /// Why
    pub reason: String,
    /// When
    pub recorded_at: DateTime<Utc>,
}

/// Platform fee earned on one checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRevenueTransaction {
    /// ID (UUIDv7)
    pub id: Uuid,
    /// Territory
    pub territory_id: TerritoryId,
    /// Checkout the fee was charged on
    pub checkout_id: CheckoutId,
    /// Seller transaction for the same checkout
    pub seller_transaction_id: Uuid,
    /// Fee amount (minor units)
    pub amount_cents: i64,
    /// Currency
    pub currency: Currency,
    /// Paired financial transaction (kind PlatformFee)
    pub financial_transaction_id: Uuid,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Platform outflow for one seller transaction included in a payout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformExpenseTransaction {
    /// ID (UUIDv7)
    pub id: Uuid,
    /// Territory
    pub territory_id: TerritoryId,
    /// Seller transaction paid out
    pub seller_transaction_id: Uuid,
    /// Seller receiving the payout
    pub seller_id: UserId,
    /// Payout the expense belongs to
    pub payout_id: PayoutId,
    /// Amount (minor units)
    pub amount_cents: i64,
    /// Currency
    pub currency: Currency,
    /// Payout financial transaction shared by the whole payout
    pub payout_financial_transaction_id: Uuid,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller_ft() -> (FinancialTransaction, TransactionStatusHistory) {
        FinancialTransaction::open(
            FinancialTransactionKind::Seller,
            9_500,
            Currency::USD,
            "seller share",
            FinancialReference::SellerTransaction(Uuid::now_v7()),
            FinancialTransactionStatus::Pending,
            Actor::System,
            Utc::now(),
        )
    }

    #[test]
    fn test_open_creates_initial_history() {
        let (ft, history) = seller_ft();
        assert_eq!(history.financial_transaction_id, ft.id);
        assert_eq!(history.previous_status, None);
        assert_eq!(history.new_status, FinancialTransactionStatus::Pending);
    }

    #[test]
    fn test_transition_records_previous_status() {
        let (mut ft, _) = seller_ft();
        let row = ft
            .transition(FinancialTransactionStatus::Processing, Actor::System, "payout", Utc::now())
            .unwrap();
        assert_eq!(row.previous_status, Some(FinancialTransactionStatus::Pending));
        assert_eq!(row.new_status, FinancialTransactionStatus::Processing);
        assert_eq!(ft.status, FinancialTransactionStatus::Processing);
    }

    #[test]
    fn test_invalid_transition_leaves_status() {
        let (mut ft, _) = seller_ft();
        let err = ft
            .transition(FinancialTransactionStatus::Failed, Actor::System, "x", Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(ft.status, FinancialTransactionStatus::Pending);
    }

    #[test]
    fn test_link_is_idempotent() {
        let (mut ft, _) = seller_ft();
        let other = Uuid::now_v7();
        ft.link(other);
        ft.link(other);
        assert_eq!(ft.related_transaction_ids, vec![other]);
    }
}
