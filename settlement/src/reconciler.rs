//! Payout status reconciliation
//!
//! Pulls a payout's status from the gateway and applies terminal outcomes to
//! every transaction in it. Balances are not touched: the paid bucket was
//! credited when the payout was issued.

use crate::audit::{AuditAction, AuditEntry, AuditLogger};
use crate::error::{Error, Result};
use crate::gateway::PayoutGateway;
use crate::metrics::SettlementMetrics;
use crate::retry::RetryStrategy;
use crate::types::{PayoutStatus, ReconcileOutcome};
use chrono::{DateTime, Utc};
use ledger_core::{
    Actor, FinancialTransactionStatus, Ledger, PayoutId, SellerTransaction,
    SellerTransactionStatus, TransactionAction, UnitOfWork,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Local effect of a terminal gateway status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Action applied to each seller transaction
    pub action: TransactionAction,
    /// Seller transaction status after the action
    pub transaction_status: SellerTransactionStatus,
    /// Financial transaction status after the action
    pub financial_status: FinancialTransactionStatus,
}

/// Map a gateway status to its local resolution; `None` while still in flight
pub fn resolve(status: PayoutStatus) -> Option<Resolution> {
    let (action, transaction_status, financial_status) = match status {
        PayoutStatus::Pending | PayoutStatus::Processing => return None,
        PayoutStatus::Completed => (
            TransactionAction::CompletePayout,
            SellerTransactionStatus::Paid,
            FinancialTransactionStatus::Paid,
        ),
        PayoutStatus::Failed => (
            TransactionAction::FailPayout,
            SellerTransactionStatus::Failed,
            FinancialTransactionStatus::Failed,
        ),
        PayoutStatus::Canceled => (
            TransactionAction::Cancel,
            SellerTransactionStatus::Canceled,
            FinancialTransactionStatus::Canceled,
        ),
    };
    Some(Resolution {
        action,
        transaction_status,
        financial_status,
    })
}

fn apply_action(
    tx: &mut SellerTransaction,
    action: TransactionAction,
    now: DateTime<Utc>,
) -> ledger_core::Result<()> {
    match action {
        TransactionAction::CompletePayout => tx.complete_payout(now),
        TransactionAction::FailPayout => tx.fail_payout(now),
        TransactionAction::Cancel => tx.cancel(now),
        TransactionAction::MarkReady => tx.mark_ready(now),
        TransactionAction::StartPayout => Err(ledger_core::Error::InvalidTransition {
            from: tx.status.to_string(),
            action: action.to_string(),
        }),
    }
}

/// Applies gateway payout outcomes to the ledger
#[derive(Clone)]
pub struct PayoutStatusReconciler {
    ledger: Arc<Ledger>,
    gateway: Arc<dyn PayoutGateway>,
    retry: RetryStrategy,
    audit: Arc<dyn AuditLogger>,
    metrics: SettlementMetrics,
}

impl std::fmt::Debug for PayoutStatusReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutStatusReconciler")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PayoutStatusReconciler {
    /// Create reconciler
    pub fn new(
        ledger: Arc<Ledger>,
        gateway: Arc<dyn PayoutGateway>,
        retry: RetryStrategy,
        audit: Arc<dyn AuditLogger>,
        metrics: SettlementMetrics,
    ) -> Self {
        Self {
            ledger,
            gateway,
            retry,
            audit,
            metrics,
        }
    }

    /// Bring local records in line with the gateway's view of `payout_id`
    ///
    /// Idempotent: transactions already in the target status are counted as
    /// unchanged. Any invalid transition aborts before anything is written.
    pub async fn reconcile(&self, payout_id: &PayoutId) -> Result<ReconcileOutcome> {
        let _guard = self.ledger.lock_payout(payout_id.clone()).await;

        let transactions = self.ledger.seller_transactions_by_payout(payout_id)?;
        if transactions.is_empty() {
            return Err(Error::UnknownPayout(payout_id.clone()));
        }

        let status = self
            .retry
            .execute("payout_status", || self.gateway.payout_status(payout_id))
            .await?;

        let resolution = match resolve(status) {
            Some(resolution) => resolution,
            None => {
                debug!(payout_id = %payout_id, %status, "Payout still in flight");
                return Ok(ReconcileOutcome::NoChange(status));
            }
        };

        let now = Utc::now();
        let actor = Actor::System;
        let reason = format!("payout {} {}", payout_id, status);
        let mut unit = UnitOfWork::new();
        let mut transitioned = 0;
        let mut unchanged = 0;

        for mut tx in transactions {
            if tx.status == resolution.transaction_status {
                unchanged += 1;
                continue;
            }

            let previous = tx.status;
            apply_action(&mut tx, resolution.action, now)?;

            let mut ft = self.ledger.financial_transaction(tx.financial_transaction_id)?;
            if ft.status != resolution.financial_status {
                let history =
                    ft.transition(resolution.financial_status, actor, reason.clone(), now)?;
                unit.put_financial_transaction(&ft)?;
                unit.append_status_history(&history)?;
            }

            unit.update_seller_transaction(&tx, previous)?;
            transitioned += 1;
        }

        if let Some(mut payout_ft) = self.ledger.payout_financial_transaction(payout_id)? {
            if payout_ft.status != resolution.financial_status {
                let history =
                    payout_ft.transition(resolution.financial_status, actor, reason.clone(), now)?;
                unit.put_financial_transaction(&payout_ft)?;
                unit.append_status_history(&history)?;
            }
        }

        if !unit.is_empty() {
            self.ledger.commit(unit)?;
        }

        if transitioned > 0 {
            self.metrics.payouts_reconciled_total.inc();
            self.audit.log(AuditEntry::new(
                actor,
                None,
                AuditAction::PayoutReconciled,
                "payout",
                payout_id,
                json!({
                    "status": status.to_string(),
                    "transitioned": transitioned,
                    "unchanged": unchanged,
                }),
            ));
            info!(
                payout_id = %payout_id,
                %status,
                transitioned,
                unchanged,
                "Payout reconciled"
            );
        }

        Ok(ReconcileOutcome::Applied {
            status,
            transitioned,
            unchanged,
        })
    }
}
