//! Payout worker binary
//!
//! Runs eligibility sweeps and automatic payout batches until Ctrl-C.
//! Configuration comes from the TOML file named by `SETTLEMENT_CONFIG`,
//! otherwise from environment variables.
//!
//! This build wires the in-process stand-ins: [`InMemoryCheckoutStore`] for
//! the checkout service and [`MockPayoutGateway`] for the payout provider.
//! Payouts it creates never leave the process. A deployment swaps real
//! [`CheckoutLookup`](settlement::CheckoutLookup) and
//! [`PayoutGateway`](settlement::PayoutGateway) adapters into `open_engine`.

use anyhow::Context;
use settlement::{
    Config, InMemoryCheckoutStore, MockPayoutGateway, SettlementEngine, TracingAuditLogger,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<Config> {
    match std::env::var("SETTLEMENT_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path)),
        Err(_) => Config::from_env().context("Failed to load config from environment"),
    }
}

/// Engine over the in-process checkout store and mock gateway
fn open_engine(config: Config) -> anyhow::Result<SettlementEngine> {
    tracing::warn!(
        checkout_lookup = "in-memory",
        payout_gateway = "mock",
        "Using in-process collaborators; payouts are not sent to a provider"
    );

    SettlementEngine::open(
        config,
        Arc::new(InMemoryCheckoutStore::new()),
        Arc::new(MockPayoutGateway::new()),
        Arc::new(TracingAuditLogger),
    )
    .context("Failed to open settlement engine")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(config.log_json);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting payout worker"
    );

    let scheduler_enabled = config.scheduler.enabled;
    let engine = open_engine(config)?;

    if !scheduler_enabled {
        tracing::info!("Scheduler disabled, waiting for shutdown");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = engine.scheduler();
    let worker = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down payout worker");
    shutdown_tx.send(true)?;

    worker.await??;

    let stats = engine.ledger().stats()?;
    tracing::info!(
        seller_transactions = stats.seller_transactions,
        financial_transactions = stats.financial_transactions,
        "Payout worker stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_stand_in_engine_runs_a_tick() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.ledger.data_dir = temp_dir.path().join("ledger");
        config.ledger.sync_writes = false;

        let engine = open_engine(config).unwrap();
        let tick = engine.scheduler().run_once(Utc::now()).await.unwrap();

        assert_eq!(tick.territories, 0);
        assert!(tick.payout_runs.is_empty());
        assert_eq!(engine.metrics().payouts_created_total.get(), 0);
    }
}
