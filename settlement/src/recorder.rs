//! Settlement recorder: one paid checkout → one atomic set of ledger records
//!
//! Records written per checkout:
//!
//! - seller transaction (gross / fee / net)
//! - seller balance credit (pending, or ready if already eligible)
//! - seller financial transaction + history row
//! - platform revenue transaction
//! - platform-fee financial transaction + history row, cross-linked with the seller one
//! - platform balance revenue credit
//!
//! The checkout lock plus the unique checkout claim in the unit of work make
//! duplicate deliveries of the same checkout settle exactly once.

use crate::audit::{AuditAction, AuditEntry, AuditLogger};
use crate::checkout::CheckoutLookup;
use crate::eligibility;
use crate::error::{Error, Result};
use crate::metrics::SettlementMetrics;
use crate::types::{Checkout, CheckoutStatus, RecordOutcome};
use chrono::{DateTime, Utc};
use ledger_core::{
    cents_from_decimal, Actor, CheckoutId, Error as LedgerError, FinancialReference,
    FinancialTransaction, FinancialTransactionKind, FinancialTransactionStatus, Ledger,
    PlatformFinancialBalance, PlatformRevenueTransaction, SellerBalance, SellerBalanceKey,
    SellerTransaction, SellerTransactionStatus, UnitOfWork,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Checkout amounts in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementAmounts {
    /// Items subtotal
    pub gross_cents: i64,
    /// Platform fee
    pub fee_cents: i64,
    /// gross − fee (may be negative)
    pub net_cents: i64,
}

impl SettlementAmounts {
    /// Convert checkout totals; rejects negative totals
    pub fn from_totals(items_subtotal: Decimal, platform_fee: Decimal) -> Result<Self> {
        let gross_cents = to_cents("items subtotal", items_subtotal)?;
        let fee_cents = to_cents("platform fee", platform_fee)?;
        let net_cents = gross_cents
            .checked_sub(fee_cents)
            .ok_or_else(|| Error::Amount("net amount overflows".to_string()))?;

        Ok(Self {
            gross_cents,
            fee_cents,
            net_cents,
        })
    }
}

fn to_cents(name: &str, amount: Decimal) -> Result<i64> {
    let cents = cents_from_decimal(amount).map_err(|e| Error::Amount(format!("{}: {}", name, e)))?;
    if cents < 0 {
        return Err(Error::Amount(format!("{} must be non-negative, got {}", name, amount)));
    }
    Ok(cents)
}

/// Turns paid checkouts into ledger records
#[derive(Clone)]
pub struct SettlementRecorder {
    ledger: Arc<Ledger>,
    checkouts: Arc<dyn CheckoutLookup>,
    audit: Arc<dyn AuditLogger>,
    metrics: SettlementMetrics,
}

impl std::fmt::Debug for SettlementRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementRecorder").finish_non_exhaustive()
    }
}

impl SettlementRecorder {
    /// Create recorder
    pub fn new(
        ledger: Arc<Ledger>,
        checkouts: Arc<dyn CheckoutLookup>,
        audit: Arc<dyn AuditLogger>,
        metrics: SettlementMetrics,
    ) -> Self {
        Self {
            ledger,
            checkouts,
            audit,
            metrics,
        }
    }

    /// Record a paid checkout; re-running on a recorded checkout is a no-op success
    pub async fn record_paid_checkout(&self, checkout_id: CheckoutId) -> Result<RecordOutcome> {
        let _checkout_guard = self.ledger.lock_checkout(checkout_id).await;

        if let Some(existing) = self.ledger.seller_transaction_for_checkout(&checkout_id)? {
            debug!(checkout_id = %checkout_id, transaction_id = %existing.id, "Checkout already settled");
            return Ok(RecordOutcome::AlreadyRecorded {
                transaction_id: existing.id,
            });
        }

        let checkout = self
            .checkouts
            .checkout(&checkout_id)
            .await?
            .ok_or(Error::CheckoutNotFound(checkout_id))?;
        if checkout.status != CheckoutStatus::Paid {
            return Err(Error::CheckoutNotPaid {
                checkout_id,
                status: checkout.status,
            });
        }

        let amounts = SettlementAmounts::from_totals(
            checkout.totals.items_subtotal,
            checkout.totals.platform_fee,
        )?;

        let key = SellerBalanceKey::new(checkout.territory_id, checkout.seller_id, checkout.currency);
        let _balance_guard = self.ledger.lock_seller_balance(key).await;
        let _platform_guard = self
            .ledger
            .lock_platform_balance(checkout.territory_id, checkout.currency)
            .await;

        let now = Utc::now();
        let (unit, tx, promoted) = self.build_records(&checkout, key, amounts, now)?;
        self.ledger.commit(unit)?;

        self.metrics.checkouts_recorded_total.inc();
        if promoted {
            self.metrics.transactions_promoted_total.inc();
        }
        self.audit.log(AuditEntry::new(
            Actor::System,
            Some(tx.territory_id),
            AuditAction::TransactionCreated,
            "seller_transaction",
            tx.id,
            json!({
                "checkout_id": checkout_id.to_string(),
                "gross_cents": tx.gross_amount_cents,
                "fee_cents": tx.platform_fee_cents,
                "net_cents": tx.net_amount_cents,
                "currency": tx.currency.code(),
                "status": tx.status.to_string(),
            }),
        ));
        info!(
            checkout_id = %checkout_id,
            transaction_id = %tx.id,
            net_cents = tx.net_amount_cents,
            promoted,
            "Checkout settled"
        );

        Ok(RecordOutcome::Recorded {
            transaction_id: tx.id,
            promoted,
        })
    }

    fn build_records(
        &self,
        checkout: &Checkout,
        key: SellerBalanceKey,
        amounts: SettlementAmounts,
        now: DateTime<Utc>,
    ) -> Result<(UnitOfWork, SellerTransaction, bool)> {
        let tx_id = Uuid::now_v7();
        let revenue_id = Uuid::now_v7();

        let (mut seller_ft, seller_history) = FinancialTransaction::open(
            FinancialTransactionKind::Seller,
            amounts.net_cents,
            checkout.currency,
            format!("Seller share of checkout {}", checkout.id),
            FinancialReference::SellerTransaction(tx_id),
            FinancialTransactionStatus::Pending,
            Actor::System,
            now,
        );

        let mut tx = SellerTransaction {
            id: tx_id,
            territory_id: checkout.territory_id,
            store_id: checkout.store_id,
            checkout_id: checkout.id,
            seller_id: checkout.seller_id,
            gross_amount_cents: amounts.gross_cents,
            platform_fee_cents: amounts.fee_cents,
            net_amount_cents: amounts.net_cents,
            currency: checkout.currency,
            status: SellerTransactionStatus::Pending,
            payout_id: None,
            financial_transaction_id: seller_ft.id,
            created_at: now,
            ready_at: None,
            paid_at: None,
            updated_at: now,
        };
        if !tx.amounts_reconcile() {
            return Err(LedgerError::InvariantViolation(format!(
                "gross {} != fee {} + net {}",
                tx.gross_amount_cents, tx.platform_fee_cents, tx.net_amount_cents
            ))
            .into());
        }

        let mut balance = self
            .ledger
            .seller_balance(&key)?
            .unwrap_or_else(|| SellerBalance::new(key, now));
        balance.add_pending(tx.payable_cents(), now)?;

        let config = self.ledger.active_payout_config(&checkout.territory_id)?;
        let promoted = eligibility::evaluate(config.as_ref(), &tx, &balance, now).is_promoted();
        if promoted {
            eligibility::promote(&mut tx, &mut balance, now)?;
        }

        let (mut fee_ft, fee_history) = FinancialTransaction::open(
            FinancialTransactionKind::PlatformFee,
            amounts.fee_cents,
            checkout.currency,
            format!("Platform fee on checkout {}", checkout.id),
            FinancialReference::PlatformRevenue(revenue_id),
            FinancialTransactionStatus::Paid,
            Actor::System,
            now,
        );
        seller_ft.link(fee_ft.id);
        fee_ft.link(seller_ft.id);

        let revenue = PlatformRevenueTransaction {
            id: revenue_id,
            territory_id: checkout.territory_id,
            checkout_id: checkout.id,
            seller_transaction_id: tx.id,
            amount_cents: amounts.fee_cents,
            currency: checkout.currency,
            financial_transaction_id: fee_ft.id,
            created_at: now,
        };

        let mut platform = self
            .ledger
            .platform_balance(&checkout.territory_id, &checkout.currency)?
            .unwrap_or_else(|| {
                PlatformFinancialBalance::new(checkout.territory_id, checkout.currency, now)
            });
        platform.add_revenue(amounts.fee_cents, now)?;

        let mut unit = UnitOfWork::new();
        unit.insert_seller_transaction(&tx)?;
        unit.put_seller_balance(&balance)?;
        unit.put_financial_transaction(&seller_ft)?;
        unit.append_status_history(&seller_history)?;
        unit.insert_platform_revenue(&revenue)?;
        unit.put_financial_transaction(&fee_ft)?;
        unit.append_status_history(&fee_history)?;
        unit.put_platform_balance(&platform)?;

        Ok((unit, tx, promoted))
    }

    /// Cancel a Pending or ReadyForPayout transaction
    ///
    /// Removes its credited amount from the bucket it sits in and cancels its
    /// financial transaction. Platform revenue already collected is kept.
    pub async fn cancel_transaction(
        &self,
        transaction_id: Uuid,
        actor: Actor,
        reason: &str,
    ) -> Result<SellerTransaction> {
        let tx = self.ledger.seller_transaction(transaction_id)?;
        let key = SellerBalanceKey::new(tx.territory_id, tx.seller_id, tx.currency);
        let _guard = self.ledger.lock_seller_balance(key).await;

        let mut tx = self.ledger.seller_transaction(transaction_id)?;
        let previous = tx.status;
        let now = Utc::now();
        tx.cancel(now)?;

        let mut balance = self
            .ledger
            .seller_balance(&key)?
            .ok_or_else(|| LedgerError::BalanceNotFound(key.to_string()))?;
        match previous {
            SellerTransactionStatus::Pending => balance.remove_pending(tx.payable_cents(), now)?,
            SellerTransactionStatus::ReadyForPayout => {
                balance.remove_ready_for_payout(tx.payable_cents(), now)?
            }
            other => {
                return Err(LedgerError::InvariantViolation(format!(
                    "canceled transaction {} from {}",
                    tx.id, other
                ))
                .into())
            }
        }

        let mut ft = self.ledger.financial_transaction(tx.financial_transaction_id)?;
        let history = ft.transition(FinancialTransactionStatus::Canceled, actor, reason, now)?;

        let mut unit = UnitOfWork::new();
        unit.update_seller_transaction(&tx, previous)?;
        unit.put_seller_balance(&balance)?;
        unit.put_financial_transaction(&ft)?;
        unit.append_status_history(&history)?;
        self.ledger.commit(unit)?;

        self.metrics.transactions_canceled_total.inc();
        self.audit.log(AuditEntry::new(
            actor,
            Some(tx.territory_id),
            AuditAction::TransactionCanceled,
            "seller_transaction",
            tx.id,
            json!({ "previous_status": previous.to_string(), "reason": reason }),
        ));
        info!(transaction_id = %tx.id, previous = %previous, "Transaction canceled");

        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_reconcile() {
        let amounts =
            SettlementAmounts::from_totals(Decimal::new(12_345, 2), Decimal::new(617, 2)).unwrap();
        assert_eq!(amounts.gross_cents, 12_345);
        assert_eq!(amounts.fee_cents, 617);
        assert_eq!(amounts.gross_cents, amounts.fee_cents + amounts.net_cents);
    }

    #[test]
    fn test_fee_above_gross_gives_negative_net() {
        let amounts =
            SettlementAmounts::from_totals(Decimal::new(100, 2), Decimal::new(250, 2)).unwrap();
        assert_eq!(amounts.net_cents, -150);
    }

    #[test]
    fn test_sub_cent_totals_round() {
        let amounts =
            SettlementAmounts::from_totals(Decimal::new(10_005, 3), Decimal::new(4, 3)).unwrap();
        assert_eq!(amounts.gross_cents, 1_001);
        assert_eq!(amounts.fee_cents, 0);
    }

    #[test]
    fn test_negative_totals_rejected() {
        assert!(matches!(
            SettlementAmounts::from_totals(Decimal::new(-1, 0), Decimal::ZERO),
            Err(Error::Amount(_))
        ));
    }
}
