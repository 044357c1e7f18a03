//! Payout batcher
//!
//! Groups ReadyForPayout transactions by (seller, currency), skips groups below
//! the minimum payout, and greedily splits groups above the maximum into
//! consecutive sub-batches in arrival order. Each sub-batch becomes one gateway
//! payout; a failed call leaves its transactions ReadyForPayout and does not
//! stop other groups.

use crate::audit::{AuditAction, AuditEntry, AuditLogger};
use crate::error::{Error, Result};
use crate::gateway::PayoutGateway;
use crate::metrics::SettlementMetrics;
use crate::retry::RetryStrategy;
use crate::types::{CreatedPayout, PayoutFailure, PayoutRequest, PayoutRunReport, SkippedGroup};
use chrono::Utc;
use ledger_core::{
    Actor, Currency, Error as LedgerError, FinancialReference, FinancialTransaction,
    FinancialTransactionKind, FinancialTransactionStatus, Ledger,
    PlatformExpenseTransaction, PlatformFinancialBalance, SellerBalanceKey, SellerTransaction,
    SellerTransactionStatus, TerritoryId, TerritoryPayoutConfig, UnitOfWork, UserId,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Greedy split of a group into sub-batches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Consecutive index runs, each summing to at most the maximum
    pub batches: Vec<Vec<usize>>,
    /// Indices whose single amount exceeds the maximum
    pub oversized: Vec<usize>,
}

/// Split `amounts` in order into consecutive runs whose sums stay ≤ `max`
///
/// With no maximum everything lands in one batch. A single amount above the
/// maximum can never be paid and is reported instead of batched; it also
/// closes the current run, so every batch covers adjacent indices.
pub fn partition_greedy(amounts: &[i64], max: Option<i64>) -> Partition {
    let mut partition = Partition::default();
    let mut current: Vec<usize> = Vec::new();
    let mut current_sum: i64 = 0;

    for (index, &amount) in amounts.iter().enumerate() {
        if let Some(max) = max {
            if amount > max {
                if !current.is_empty() {
                    partition.batches.push(std::mem::take(&mut current));
                    current_sum = 0;
                }
                partition.oversized.push(index);
                continue;
            }
            if !current.is_empty() && current_sum.saturating_add(amount) > max {
                partition.batches.push(std::mem::take(&mut current));
                current_sum = 0;
            }
        }
        current.push(index);
        current_sum = current_sum.saturating_add(amount);
    }

    if !current.is_empty() {
        partition.batches.push(current);
    }
    partition
}

/// Deterministic identifier of a sub-batch, sent as gateway metadata
pub fn batch_key(transaction_ids: &[Uuid], amount_cents: i64) -> String {
    match (transaction_ids.first(), transaction_ids.last()) {
        (Some(first), Some(last)) => format!(
            "{}:{}:{}:{}",
            first.simple(),
            last.simple(),
            transaction_ids.len(),
            amount_cents
        ),
        _ => format!("empty:{}", amount_cents),
    }
}

struct PayoutGroup {
    seller_id: UserId,
    currency: Currency,
    transaction_ids: Vec<Uuid>,
}

/// Groups in order of their first transaction
fn group_by_seller(transactions: &[SellerTransaction]) -> Vec<PayoutGroup> {
    let mut groups: Vec<PayoutGroup> = Vec::new();
    let mut positions: HashMap<(UserId, Currency), usize> = HashMap::new();

    for tx in transactions {
        let position = *positions
            .entry((tx.seller_id, tx.currency))
            .or_insert_with(|| {
                groups.push(PayoutGroup {
                    seller_id: tx.seller_id,
                    currency: tx.currency,
                    transaction_ids: Vec::new(),
                });
                groups.len() - 1
            });
        groups[position].transaction_ids.push(tx.id);
    }
    groups
}

/// Drives ready transactions through the payout gateway
#[derive(Clone)]
pub struct PayoutBatcher {
    ledger: Arc<Ledger>,
    gateway: Arc<dyn PayoutGateway>,
    retry: RetryStrategy,
    audit: Arc<dyn AuditLogger>,
    metrics: SettlementMetrics,
}

impl std::fmt::Debug for PayoutBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutBatcher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PayoutBatcher {
    /// Create batcher
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

    /// Pay out every eligible group of a territory
    ///
    /// No-op without an active config or with auto-payout off. Safe to re-run:
    /// failed sub-batches stay ReadyForPayout and are picked up again.
    pub async fn process_pending_payouts(
        &self,
        territory: &TerritoryId,
        actor: Actor,
    ) -> Result<PayoutRunReport> {
        let mut report = PayoutRunReport::default();

        let config = match self.ledger.active_payout_config(territory)? {
            Some(config) if config.auto_payout => config,
            Some(_) => {
                debug!(territory_id = %territory, "Auto-payout disabled");
                return Ok(report);
            }
            None => {
                debug!(territory_id = %territory, "No active payout config");
                return Ok(report);
            }
        };

        let ready = self
            .ledger
            .seller_transactions_by_status(territory, SellerTransactionStatus::ReadyForPayout)?;
        let groups = group_by_seller(&ready);

        info!(
            territory_id = %territory,
            transactions = ready.len(),
            groups = groups.len(),
            "Processing pending payouts"
        );

        for group in groups {
            self.process_group(territory, &config, group, actor, &mut report)
                .await?;
        }

        info!(
            territory_id = %territory,
            payouts = report.payouts_created(),
            failures = report.failures.len(),
            skipped = report.skipped.len(),
            oversized = report.oversized.len(),
            "Payout run complete"
        );

        Ok(report)
    }

    async fn process_group(
        &self,
        territory: &TerritoryId,
        config: &TerritoryPayoutConfig,
        group: PayoutGroup,
        actor: Actor,
        report: &mut PayoutRunReport,
    ) -> Result<()> {
        let key = SellerBalanceKey::new(*territory, group.seller_id, group.currency);
        let _guard = self.ledger.lock_seller_balance(key).await;

        // Another run may have batched some of these while we waited
        let mut transactions = Vec::with_capacity(group.transaction_ids.len());
        for id in &group.transaction_ids {
            let tx = self.ledger.seller_transaction(*id)?;
            if tx.status == SellerTransactionStatus::ReadyForPayout {
                transactions.push(tx);
            }
        }

        let total: i64 = transactions.iter().map(|tx| tx.payable_cents()).sum();
        if transactions.is_empty() || total <= 0 || total < config.minimum_payout_amount_cents {
            debug!(
                seller_id = %group.seller_id,
                total_cents = total,
                minimum_cents = config.minimum_payout_amount_cents,
                "Group below minimum payout"
            );
            report.skipped.push(SkippedGroup {
                seller_id: group.seller_id,
                currency: group.currency,
                total_cents: total,
                minimum_cents: config.minimum_payout_amount_cents,
            });
            return Ok(());
        }

        let amounts: Vec<i64> = transactions.iter().map(|tx| tx.payable_cents()).collect();
        let partition = partition_greedy(&amounts, config.maximum_payout_amount_cents);

        for index in &partition.oversized {
            let tx = &transactions[*index];
            warn!(
                transaction_id = %tx.id,
                amount_cents = tx.payable_cents(),
                "Transaction exceeds maximum payout amount"
            );
            report.oversized.push(tx.id);
        }

        for indices in partition.batches {
            let batch: Vec<SellerTransaction> =
                indices.iter().map(|i| transactions[*i].clone()).collect();
            let transaction_ids: Vec<Uuid> = batch.iter().map(|tx| tx.id).collect();
            let amount_cents: i64 = batch.iter().map(|tx| tx.payable_cents()).sum();

            match self.issue_payout(key, batch, amount_cents, actor).await {
                Ok(created) => report.payouts.push(created),
                Err(e) => {
                    self.metrics.payout_failures_total.inc();
                    warn!(
                        seller_id = %group.seller_id,
                        amount_cents,
                        error = %e,
                        "Payout sub-batch failed"
                    );
                    self.audit.log(AuditEntry::new(
                        actor,
                        Some(*territory),
                        AuditAction::PayoutFailed,
                        "seller",
                        group.seller_id,
                        json!({
                            "amount_cents": amount_cents,
                            "currency": group.currency.code(),
                            "transactions": transaction_ids.len(),
                            "error": e.to_string(),
                        }),
                    ));
                    report.failures.push(PayoutFailure {
                        seller_id: group.seller_id,
                        currency: group.currency,
                        amount_cents,
                        transaction_ids,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// One gateway payout and its ledger records; caller holds the seller balance lock
    async fn issue_payout(
        &self,
        key: SellerBalanceKey,
        mut batch: Vec<SellerTransaction>,
        amount_cents: i64,
        actor: Actor,
    ) -> Result<CreatedPayout> {
        let transaction_ids: Vec<Uuid> = batch.iter().map(|tx| tx.id).collect();

        let mut metadata = BTreeMap::new();
        metadata.insert(
            PayoutRequest::BATCH_KEY.to_string(),
            batch_key(&transaction_ids, amount_cents),
        );
        metadata.insert("territory_id".to_string(), key.territory_id.to_string());
        metadata.insert(
            "transaction_count".to_string(),
            transaction_ids.len().to_string(),
        );
        let request = PayoutRequest {
            amount_cents,
            currency: key.currency,
            seller_account_id: key.seller_id,
            description: format!("Payout for {} sale(s)", transaction_ids.len()),
            metadata,
        };

        let payout_id = self
            .retry
            .execute("create_payout", || self.gateway.create_payout(&request))
            .await?;

        let _platform_guard = self
            .ledger
            .lock_platform_balance(key.territory_id, key.currency)
            .await;
        let now = Utc::now();

        let mut balance = self
            .ledger
            .seller_balance(&key)?
            .ok_or_else(|| LedgerError::BalanceNotFound(key.to_string()))?;
        balance.mark_as_paid(amount_cents, now)?;

        let mut platform = self
            .ledger
            .platform_balance(&key.territory_id, &key.currency)?
            .unwrap_or_else(|| PlatformFinancialBalance::new(key.territory_id, key.currency, now));
        platform.add_expense(amount_cents, now)?;

        let (mut payout_ft, payout_history) = FinancialTransaction::open(
            FinancialTransactionKind::Payout,
            amount_cents,
            key.currency,
            format!("Payout {} to seller {}", payout_id, key.seller_id),
            FinancialReference::Payout(payout_id.clone()),
            FinancialTransactionStatus::Processing,
            actor,
            now,
        );

        let mut unit = UnitOfWork::new();
        let reason = format!("included in payout {}", payout_id);

        for tx in &mut batch {
            let previous = tx.status;
            tx.start_payout(payout_id.clone(), now)?;

            let mut ft = self.ledger.financial_transaction(tx.financial_transaction_id)?;
            let history =
                ft.transition(FinancialTransactionStatus::Processing, actor, reason.clone(), now)?;
            ft.link(payout_ft.id);
            payout_ft.link(ft.id);

            let expense = PlatformExpenseTransaction {
                id: Uuid::now_v7(),
                territory_id: tx.territory_id,
                seller_transaction_id: tx.id,
                seller_id: tx.seller_id,
                payout_id: payout_id.clone(),
                amount_cents: tx.payable_cents(),
                currency: tx.currency,
                payout_financial_transaction_id: payout_ft.id,
                created_at: now,
            };

            unit.update_seller_transaction(tx, previous)?;
            unit.put_financial_transaction(&ft)?;
            unit.append_status_history(&history)?;
            unit.insert_platform_expense(&expense)?;
        }

        unit.put_financial_transaction(&payout_ft)?;
        unit.append_status_history(&payout_history)?;
        unit.index_payout_financial_transaction(&payout_id, payout_ft.id);
        unit.put_seller_balance(&balance)?;
        unit.put_platform_balance(&platform)?;

        if let Err(e) = self.ledger.commit(unit) {
            // Gateway holds the payout; a re-run sends the same batch key and gets it back
            error!(
                payout_id = %payout_id,
                error = %e,
                "Payout created at gateway but ledger commit failed"
            );
            return Err(Error::Ledger(e));
        }

        self.metrics.payouts_created_total.inc();
        self.audit.log(AuditEntry::new(
            actor,
            Some(key.territory_id),
            AuditAction::PayoutCreated,
            "payout",
            &payout_id,
            json!({
                "seller_id": key.seller_id.to_string(),
                "amount_cents": amount_cents,
                "currency": key.currency.code(),
                "transactions": transaction_ids.len(),
            }),
        ));
        info!(
            payout_id = %payout_id,
            seller_id = %key.seller_id,
            amount_cents,
            transactions = transaction_ids.len(),
            "Payout created"
        );

        Ok(CreatedPayout {
            payout_id,
            seller_id: key.seller_id,
            currency: key.currency,
            amount_cents,
            transaction_ids,
        })
    }
}
