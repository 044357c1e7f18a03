//! Payout scheduler
//!
//! Each tick, for every territory with a payout config:
//! - Runs the eligibility sweep
//! - Runs a payout batch when auto-payout is on, no approval is required and
//!   the territory's frequency interval has elapsed since its last clean run
//!
//! A run with any failed group is not recorded, so the next tick retries it.

use crate::batcher::PayoutBatcher;
use crate::eligibility::PayoutEligibilityGate;
use crate::types::PayoutRunReport;
use crate::Result;
use chrono::{DateTime, Utc};
use ledger_core::{Actor, Ledger, TerritoryId, TerritoryPayoutConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

/// Summary of one scheduler tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Territories visited
    pub territories: usize,

    /// Transactions promoted by the sweeps
    pub promoted: usize,

    /// Payout runs, by territory
    pub payout_runs: Vec<(TerritoryId, PayoutRunReport)>,
}

/// Whether a territory is due for an automatic payout run
pub fn payout_due(
    config: &TerritoryPayoutConfig,
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if !config.is_active || !config.auto_payout || config.approval_required {
        return false;
    }
    match last_run {
        None => true,
        Some(last) => now - last >= config.frequency.interval(),
    }
}

/// Periodic eligibility sweep and payout runner
#[derive(Debug, Clone)]
pub struct PayoutScheduler {
    ledger: Arc<Ledger>,
    gate: PayoutEligibilityGate,
    batcher: PayoutBatcher,
    interval: Duration,
    last_run: Arc<RwLock<HashMap<TerritoryId, DateTime<Utc>>>>,
}

impl PayoutScheduler {
    /// Create scheduler
    pub fn new(
        ledger: Arc<Ledger>,
        gate: PayoutEligibilityGate,
        batcher: PayoutBatcher,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            gate,
            batcher,
            interval,
            last_run: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Last automatic payout run of a territory
    pub async fn last_run(&self, territory: &TerritoryId) -> Option<DateTime<Utc>> {
        self.last_run.read().await.get(territory).copied()
    }

    /// One pass over all territories
    ///
    /// A failing territory is logged and skipped so the others still run.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let territories = self.ledger.territories_with_payout_config()?;
        let mut report = TickReport {
            territories: territories.len(),
            ..TickReport::default()
        };

        for territory in territories {
            match self.gate.sweep(&territory, now).await {
                Ok(promoted) => report.promoted += promoted,
                Err(e) => {
                    warn!(territory_id = %territory, error = %e, "Eligibility sweep failed");
                    continue;
                }
            }

            let config = match self.ledger.active_payout_config(&territory)? {
                Some(config) => config,
                None => continue,
            };

            let last = self.last_run(&territory).await;
            if !payout_due(&config, last, now) {
                debug!(territory_id = %territory, "Payout run not due");
                continue;
            }

            match self
                .batcher
                .process_pending_payouts(&territory, Actor::System)
                .await
            {
                Ok(run) => {
                    if run.failures.is_empty() {
                        self.last_run.write().await.insert(territory, now);
                    } else {
                        warn!(
                            territory_id = %territory,
                            failures = run.failures.len(),
                            "Payout run had failures, territory stays due"
                        );
                    }
                    report.payout_runs.push((territory, run));
                }
                Err(e) => warn!(territory_id = %territory, error = %e, "Payout run failed"),
            }
        }

        self.ledger.prune_locks();
        Ok(report)
    }

    /// Tick until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(interval_secs = self.interval.as_secs(), "Starting payout scheduler");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once(Utc::now()).await {
                        Ok(tick) => debug!(
                            territories = tick.territories,
                            promoted = tick.promoted,
                            payout_runs = tick.payout_runs.len(),
                            "Scheduler tick complete"
                        ),
                        Err(e) => warn!(error = %e, "Scheduler tick failed"),
                    }
                }
                changed = shutdown.changed() => {
                    let stop = changed.is_err() || *shutdown.borrow();
                    if stop {
                        break;
                    }
                }
            }
        }

        info!("Payout scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use ledger_core::{Currency, PayoutConfigDraft, PayoutFrequency};

    fn config(auto_payout: bool, approval_required: bool) -> TerritoryPayoutConfig {
        TerritoryPayoutConfig::from_draft(
            TerritoryId::new_v4(),
            PayoutConfigDraft {
                retention_period_days: 7,
                minimum_payout_amount_cents: 1_000,
                maximum_payout_amount_cents: None,
                frequency: PayoutFrequency::Weekly,
                auto_payout,
                approval_required,
                currency: Currency::USD,
            },
            Actor::System,
            Utc::now(),
        )
    }

    #[test]
    fn test_first_run_is_due() {
        assert!(payout_due(&config(true, false), None, Utc::now()));
    }

    #[test]
    fn test_frequency_interval() {
        let config = config(true, false);
        let now = Utc::now();

        assert!(!payout_due(&config, Some(now - ChronoDuration::days(6)), now));
        assert!(payout_due(&config, Some(now - ChronoDuration::days(7)), now));
    }

    #[test]
    fn test_manual_territories_never_due() {
        let now = Utc::now();
        assert!(!payout_due(&config(false, false), None, now));
        assert!(!payout_due(&config(true, true), None, now));
    }
}
