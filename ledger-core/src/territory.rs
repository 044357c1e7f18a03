//! Versioned per-territory configuration rows
//!
//! Exactly one row per scope is active at a time. Replacing a configuration
//! deactivates the old row and inserts a new one; rows are never edited in place
//! or deleted, so the history stays readable.

use crate::types::{Actor, Currency, TerritoryId};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How often automatic payouts run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutFrequency {
    /// Every day
    Daily,
    /// Every 7 days
    Weekly,
    /// Every 14 days
    Biweekly,
    /// Every 30 days
    Monthly,
}

impl PayoutFrequency {
    /// Minimum spacing between two automatic runs
    pub fn interval(&self) -> Duration {
        match self {
            PayoutFrequency::Daily => Duration::days(1),
            PayoutFrequency::Weekly => Duration::days(7),
            PayoutFrequency::Biweekly => Duration::days(14),
            PayoutFrequency::Monthly => Duration::days(30),
        }
    }
}

/// Input for a new payout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfigDraft {
    /// Days a sale is held before it may be paid out
    pub retention_period_days: u32,
    /// Smallest payout (minor units)
    pub minimum_payout_amount_cents: i64,
    /// Largest single payout (minor units)
    pub maximum_payout_amount_cents: Option<i64>,
    /// Payout cadence
    pub frequency: PayoutFrequency,
    /// Scheduler may run payouts without an operator
    pub auto_payout: bool,
    /// Payouts must be triggered by an operator
    pub approval_required: bool,
    /// Payout currency
    pub currency: Currency,
}

impl PayoutConfigDraft {
    /// Reject drafts that could never be satisfied
    pub fn validate(&self) -> Result<()> {
        if self.minimum_payout_amount_cents < 0 {
            return Err(Error::Config(
                "minimum payout amount must be non-negative".to_string(),
            ));
        }
        if let Some(max) = self.maximum_payout_amount_cents {
            if max <= 0 {
                return Err(Error::Config("maximum payout amount must be positive".to_string()));
            }
            if max < self.minimum_payout_amount_cents {
                return Err(Error::Config(format!(
                    "maximum payout amount {} is below minimum {}",
                    max, self.minimum_payout_amount_cents
                )));
            }
        }
        Ok(())
    }
}

/// Territory payout configuration row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryPayoutConfig {
    /// Row ID (UUIDv7)
    pub id: Uuid,
    /// Territory
    pub territory_id: TerritoryId,
    /// Days a sale is held before it may be paid out
    pub retention_period_days: u32,
    /// Smallest payout (minor units)
    pub minimum_payout_amount_cents: i64,
    /// Largest single payout (minor units)
    pub maximum_payout_amount_cents: Option<i64>,
    /// Payout cadence
    pub frequency: PayoutFrequency,
    /// Scheduler may run payouts without an operator
    pub auto_payout: bool,
    /// Payouts must be triggered by an operator
    pub approval_required: bool,
    /// Payout currency
    pub currency: Currency,
    /// Only active rows are read by settlement
    pub is_active: bool,
    /// Who activated this row
    pub created_by: Actor,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Set when replaced
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl TerritoryPayoutConfig {
    /// Build an active row from a draft
    pub fn from_draft(
        territory_id: TerritoryId,
        draft: PayoutConfigDraft,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            territory_id,
            retention_period_days: draft.retention_period_days,
            minimum_payout_amount_cents: draft.minimum_payout_amount_cents,
            maximum_payout_amount_cents: draft.maximum_payout_amount_cents,
            frequency: draft.frequency,
            auto_payout: draft.auto_payout,
            approval_required: draft.approval_required,
            currency: draft.currency,
            is_active: true,
            created_by: actor,
            created_at: now,
            deactivated_at: None,
        }
    }

    /// Retention window as a duration
    pub fn retention_period(&self) -> Duration {
        Duration::days(i64::from(self.retention_period_days))
    }

    /// Mark replaced
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.deactivated_at = Some(now);
    }
}

/// Listing item type a fee applies to (e.g. "product", "service")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemType(String);

impl ItemType {
    /// Create item type
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fee rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeMode {
    /// Fixed amount per unit (major units)
    Fixed {
        /// Amount charged per unit sold
        amount: Decimal,
    },
    /// Share of the line subtotal (0.05 = 5%)
    Percentage {
        /// Rate applied to the line subtotal
        rate: Decimal,
    },
}

impl FeeMode {
    /// Reject negative amounts and rates above 100%
    pub fn validate(&self) -> Result<()> {
        match self {
            FeeMode::Fixed { amount } if amount.is_sign_negative() => Err(Error::Config(
                format!("fixed fee must be non-negative, got {}", amount),
            )),
            FeeMode::Percentage { rate } if rate.is_sign_negative() || *rate > Decimal::ONE => {
                Err(Error::Config(format!(
                    "percentage rate must be within [0, 1], got {}",
                    rate
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Fee configuration row for (territory, item type)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Row ID (UUIDv7)
    pub id: Uuid,
    /// Territory
    pub territory_id: TerritoryId,
    /// Item type
    pub item_type: ItemType,
    /// Fee rule
    pub mode: FeeMode,
    /// Only active rows are read by the fee calculator
    pub is_active: bool,
    /// Who activated this row
    pub created_by: Actor,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Set when replaced
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl FeeConfig {
    /// Build an active row
    pub fn new(
        territory_id: TerritoryId,
        item_type: ItemType,
        mode: FeeMode,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            territory_id,
            item_type,
            mode,
            is_active: true,
            created_by: actor,
            created_at: now,
            deactivated_at: None,
        }
    }

    /// Mark replaced
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.deactivated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PayoutConfigDraft {
        PayoutConfigDraft {
            retention_period_days: 7,
            minimum_payout_amount_cents: 10_000,
            maximum_payout_amount_cents: Some(50_000),
            frequency: PayoutFrequency::Weekly,
            auto_payout: true,
            approval_required: false,
            currency: Currency::USD,
        }
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft().validate().is_ok());

        let mut bad = draft();
        bad.maximum_payout_amount_cents = Some(5_000);
        assert!(bad.validate().is_err());

        let mut negative = draft();
        negative.minimum_payout_amount_cents = -1;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_retention_period() {
        let config = TerritoryPayoutConfig::from_draft(
            TerritoryId::new_v4(),
            draft(),
            Actor::System,
            Utc::now(),
        );
        assert_eq!(config.retention_period(), Duration::days(7));
        assert!(config.is_active);
    }

    #[test]
    fn test_fee_mode_validation() {
        assert!(FeeMode::Percentage { rate: Decimal::new(5, 2) }.validate().is_ok());
        assert!(FeeMode::Percentage { rate: Decimal::new(15, 1) }.validate().is_err());
        assert!(FeeMode::Fixed { amount: Decimal::new(-1, 0) }.validate().is_err());
    }
}
