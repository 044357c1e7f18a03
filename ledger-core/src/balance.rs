//! Seller and platform running balances
//!
//! # Invariants
//!
//! - Every mutator takes a non-negative delta; negative input is rejected before any change
//! - Moving money between buckets never drives a bucket negative (hard error, no clamping)
//! - `pending + ready_for_payout + paid` changes only through `add_pending` and the `remove_*` calls

use crate::types::{Currency, TerritoryId, UserId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Balance identity: one balance per (territory, seller, currency)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SellerBalanceKey {
    /// Territory
    pub territory_id: TerritoryId,
    /// Seller
    pub seller_id: UserId,
    /// Currency
    pub currency: Currency,
}

impl SellerBalanceKey {
    /// Create key
    pub fn new(territory_id: TerritoryId, seller_id: UserId, currency: Currency) -> Self {
        Self {
            territory_id,
            seller_id,
            currency,
        }
    }
}

impl fmt::Display for SellerBalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.territory_id, self.seller_id, self.currency)
    }
}

fn ensure_non_negative(amount: i64) -> Result<()> {
    if amount < 0 {
        return Err(Error::InvalidAmount(format!(
            "balance delta must be non-negative, got {}",
            amount
        )));
    }
    Ok(())
}

fn ensure_covered(bucket: &'static str, requested: i64, available: i64) -> Result<()> {
    if requested > available {
        return Err(Error::InsufficientFunds {
            bucket,
            requested,
            available,
        });
    }
    Ok(())
}

fn checked_credit(bucket: i64, amount: i64) -> Result<i64> {
    bucket
        .checked_add(amount)
        .ok_or_else(|| Error::InvalidAmount(format!("crediting {} overflows balance", amount)))
}

/// Seller running balance, in minor units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerBalance {
    /// Territory
    pub territory_id: TerritoryId,
    /// Seller
    pub seller_id: UserId,
    /// Currency
    pub currency: Currency,
    /// Held for retention
    pub pending_cents: i64,
    /// Cleared, waiting for a payout
    pub ready_for_payout_cents: i64,
    /// Sent out in payouts
    pub paid_cents: i64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

impl SellerBalance {
    /// Empty balance for a key
    pub fn new(key: SellerBalanceKey, now: DateTime<Utc>) -> Self {
        Self {
            territory_id: key.territory_id,
            seller_id: key.seller_id,
            currency: key.currency,
            pending_cents: 0,
            ready_for_payout_cents: 0,
            paid_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance identity
    pub fn key(&self) -> SellerBalanceKey {
        SellerBalanceKey::new(self.territory_id, self.seller_id, self.currency)
    }

    /// Sum of all three buckets
    pub fn total_cents(&self) -> i64 {
        self.pending_cents + self.ready_for_payout_cents + self.paid_cents
    }

    /// Credit a new sale into the pending bucket
    pub fn add_pending(&mut self, amount: i64, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative(amount)?;
        self.pending_cents = checked_credit(self.pending_cents, amount)?;
        self.touch(now);
        Ok(())
    }

    /// pending → ready_for_payout
    pub fn move_to_ready_for_payout(&mut self, amount: i64, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative(amount)?;
        ensure_covered("pending", amount, self.pending_cents)?;
        let ready = checked_credit(self.ready_for_payout_cents, amount)?;
        self.pending_cents -= amount;
        self.ready_for_payout_cents = ready;
        self.touch(now);
        Ok(())
    }

    /// ready_for_payout → paid (applied when a payout is initiated)
    pub fn mark_as_paid(&mut self, amount: i64, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative(amount)?;
        ensure_covered("ready_for_payout", amount, self.ready_for_payout_cents)?;
        let paid = checked_credit(self.paid_cents, amount)?;
        self.ready_for_payout_cents -= amount;
        self.paid_cents = paid;
        self.touch(now);
        Ok(())
    }

    /// Remove a canceled sale from pending
    pub fn remove_pending(&mut self, amount: i64, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative(amount)?;
        ensure_covered("pending", amount, self.pending_cents)?;
        self.pending_cents -= amount;
        self.touch(now);
        Ok(())
    }

    /// Remove a canceled sale from ready_for_payout
    pub fn remove_ready_for_payout(&mut self, amount: i64, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative(amount)?;
        ensure_covered("ready_for_payout", amount, self.ready_for_payout_cents)?;
        self.ready_for_payout_cents -= amount;
        self.touch(now);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Platform revenue/expense position for one territory and currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFinancialBalance {
    /// Territory
    pub territory_id: TerritoryId,
    /// Currency
    pub currency: Currency,
    /// Collected platform fees
    pub revenue_cents: i64,
    /// Seller payouts issued
    pub expenses_cents: i64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

impl PlatformFinancialBalance {
    /// Empty balance
    pub fn new(territory_id: TerritoryId, currency: Currency, now: DateTime<Utc>) -> Self {
        Self {
            territory_id,
            currency,
            revenue_cents: 0,
            expenses_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Revenue minus expenses
    pub fn available_cents(&self) -> i64 {
        self.revenue_cents - self.expenses_cents
    }

    /// Record collected fee
    pub fn add_revenue(&mut self, amount: i64, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative(amount)?;
        self.revenue_cents = checked_credit(self.revenue_cents, amount)?;
        self.updated_at = now;
        Ok(())
    }

    /// Record payout expense
    pub fn add_expense(&mut self, amount: i64, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative(amount)?;
        self.expenses_cents = checked_credit(self.expenses_cents, amount)?;
        self.updated_at = now;
        Ok(())
    }
}
