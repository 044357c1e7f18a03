//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//! Collectors live on a private registry so several ledgers can coexist
//! in one process (tests open many).
//!
//! # Metrics
//!
//! - `ledger_commits_total` - Units of work committed
//! - `ledger_commit_failures_total` - Units of work rejected or failed
//! - `ledger_commit_duration_seconds` - Histogram of commit latencies
//! - `ledger_commit_writes` - Histogram of writes per unit of work

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Units of work committed
    pub commits_total: IntCounter,

    /// Units of work that failed
    pub commit_failures_total: IntCounter,

    /// Commit duration histogram
    pub commit_duration: Histogram,

    /// Writes per unit of work
    pub commit_writes: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("commits_total", &self.commits_total.get())
            .field("commit_failures_total", &self.commit_failures_total.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let commits_total = IntCounter::new("ledger_commits_total", "Units of work committed")?;
        registry.register(Box::new(commits_total.clone()))?;

        let commit_failures_total = IntCounter::new(
            "ledger_commit_failures_total",
            "Units of work rejected or failed",
        )?;
        registry.register(Box::new(commit_failures_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_commit_duration_seconds",
                "Histogram of commit latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        let commit_writes = Histogram::with_opts(
            HistogramOpts::new("ledger_commit_writes", "Histogram of writes per unit of work")
                .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        )?;
        registry.register(Box::new(commit_writes.clone()))?;

        Ok(Self {
            commits_total,
            commit_failures_total,
            commit_duration,
            commit_writes,
            registry,
        })
    }

    /// Record a committed unit of work
    pub fn record_commit(&self, writes: usize, duration_secs: f64) {
        self.commits_total.inc();
        self.commit_writes.observe(writes as f64);
        self.commit_duration.observe(duration_secs);
    }

    /// Record a failed commit
    pub fn record_failure(&self) {
        self.commit_failures_total.inc();
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
