//! Payout eligibility gate
//!
//! A Pending transaction becomes ReadyForPayout once the territory's retention
//! window has elapsed since it was created and `ready + net` reaches the
//! configured minimum. Promotion moves the transaction's payable amount from
//! the pending bucket to the ready bucket in the same step.

use crate::audit::{AuditAction, AuditEntry, AuditLogger};
use crate::error::Result;
use crate::metrics::SettlementMetrics;
use crate::types::{Ineligibility, Promotion};
use chrono::{DateTime, Utc};
use ledger_core::{
    Actor, Error as LedgerError, Ledger, SellerBalance, SellerBalanceKey, SellerTransaction,
    SellerTransactionStatus, TerritoryId, TerritoryPayoutConfig, UnitOfWork,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Decide whether `tx` may be promoted, without touching anything
pub fn evaluate(
    config: Option<&TerritoryPayoutConfig>,
    tx: &SellerTransaction,
    balance: &SellerBalance,
    now: DateTime<Utc>,
) -> Promotion {
    if tx.status != SellerTransactionStatus::Pending {
        return Promotion::NotYetEligible(Ineligibility::NotPending);
    }

    let config = match config {
        Some(config) if config.is_active => config,
        _ => return Promotion::NotYetEligible(Ineligibility::NoActiveConfig),
    };

    let eligible_at = tx.created_at + config.retention_period();
    if now < eligible_at {
        return Promotion::NotYetEligible(Ineligibility::RetentionRunning { eligible_at });
    }

    let projected_cents = balance
        .ready_for_payout_cents
        .saturating_add(tx.payable_cents());
    if projected_cents < config.minimum_payout_amount_cents {
        return Promotion::NotYetEligible(Ineligibility::BelowMinimum {
            projected_cents,
            minimum_cents: config.minimum_payout_amount_cents,
        });
    }

    Promotion::Promoted
}

/// Mark `tx` ready and move its payable amount pending → ready on `balance`
///
/// On error both values may be partially changed; callers discard them.
pub fn promote(
    tx: &mut SellerTransaction,
    balance: &mut SellerBalance,
    now: DateTime<Utc>,
) -> ledger_core::Result<()> {
    balance.move_to_ready_for_payout(tx.payable_cents(), now)?;
    tx.mark_ready(now)
}

/// Promotes Pending transactions against the ledger
#[derive(Clone)]
pub struct PayoutEligibilityGate {
    ledger: Arc<Ledger>,
    audit: Arc<dyn AuditLogger>,
    metrics: SettlementMetrics,
}

impl std::fmt::Debug for PayoutEligibilityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutEligibilityGate").finish_non_exhaustive()
    }
}

impl PayoutEligibilityGate {
    /// Create gate
    pub fn new(
        ledger: Arc<Ledger>,
        audit: Arc<dyn AuditLogger>,
        metrics: SettlementMetrics,
    ) -> Self {
        Self {
            ledger,
            audit,
            metrics,
        }
    }

    /// Evaluate one transaction and promote it if eligible
    pub async fn try_promote(&self, transaction_id: Uuid, now: DateTime<Utc>) -> Result<Promotion> {
        let tx = self.ledger.seller_transaction(transaction_id)?;
        let key = SellerBalanceKey::new(tx.territory_id, tx.seller_id, tx.currency);
        let _guard = self.ledger.lock_seller_balance(key).await;

        // Re-read under the lock
        let mut tx = self.ledger.seller_transaction(transaction_id)?;
        let mut balance = self
            .ledger
            .seller_balance(&key)?
            .ok_or_else(|| LedgerError::BalanceNotFound(key.to_string()))?;
        let config = self.ledger.active_payout_config(&tx.territory_id)?;

        let decision = evaluate(config.as_ref(), &tx, &balance, now);
        if let Promotion::NotYetEligible(reason) = decision {
            debug!(transaction_id = %tx.id, ?reason, "Not yet eligible for payout");
            return Ok(decision);
        }

        let previous = tx.status;
        promote(&mut tx, &mut balance, now)?;

        let mut unit = UnitOfWork::new();
        unit.update_seller_transaction(&tx, previous)?;
        unit.put_seller_balance(&balance)?;
        self.ledger.commit(unit)?;

        self.metrics.transactions_promoted_total.inc();
        self.audit.log(AuditEntry::new(
            Actor::System,
            Some(tx.territory_id),
            AuditAction::TransactionPromoted,
            "seller_transaction",
            tx.id,
            json!({ "payable_cents": tx.payable_cents() }),
        ));
        info!(transaction_id = %tx.id, seller_id = %tx.seller_id, "Transaction ready for payout");

        Ok(Promotion::Promoted)
    }

    /// Re-evaluate every Pending transaction of a territory; returns the number promoted
    pub async fn sweep(&self, territory: &TerritoryId, now: DateTime<Utc>) -> Result<usize> {
        if self.ledger.active_payout_config(territory)?.is_none() {
            debug!(territory_id = %territory, "No active payout config, skipping sweep");
            return Ok(0);
        }

        let pending = self
            .ledger
            .seller_transactions_by_status(territory, SellerTransactionStatus::Pending)?;
        let mut promoted = 0;

        for tx in pending {
            match self.try_promote(tx.id, now).await {
                Ok(Promotion::Promoted) => promoted += 1,
                Ok(Promotion::NotYetEligible(_)) => {}
                Err(e) => warn!(transaction_id = %tx.id, error = %e, "Promotion failed"),
            }
        }

        if promoted > 0 {
            info!(territory_id = %territory, promoted, "Eligibility sweep complete");
        }
        Ok(promoted)
    }
}
