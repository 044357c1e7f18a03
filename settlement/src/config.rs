//! Configuration for settlement engine

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settlement engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Ledger configuration
    pub ledger: ledger_core::Config,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Gateway configuration
    pub gateway: GatewayConfig,

    /// Emit logs as JSON
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "settlement".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger: ledger_core::Config::default(),
            scheduler: SchedulerConfig::default(),
            gateway: GatewayConfig::default(),
            log_json: false,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the periodic loop
    pub enabled: bool,

    /// Seconds between sweeps
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 300, // 5 minutes
        }
    }
}

impl SchedulerConfig {
    /// Sweep interval as a duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Payout gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Per-call timeout (ms)
    pub timeout_ms: u64,

    /// Retry policy
    pub retry: RetryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry: RetryConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Per-call timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config {
            ledger: ledger_core::Config::from_env()?,
            ..Config::default()
        };

        if let Ok(dir) = std::env::var("SETTLEMENT_LEDGER_DIR") {
            config.ledger.data_dir = PathBuf::from(dir);
        }

        if let Ok(secs) = std::env::var("SETTLEMENT_SWEEP_INTERVAL_SECS") {
            config.scheduler.sweep_interval_secs = parse_env("SETTLEMENT_SWEEP_INTERVAL_SECS", &secs)?;
        }

        if let Ok(ms) = std::env::var("SETTLEMENT_GATEWAY_TIMEOUT_MS") {
            config.gateway.timeout_ms = parse_env("SETTLEMENT_GATEWAY_TIMEOUT_MS", &ms)?;
        }

        if let Ok(json) = std::env::var("SETTLEMENT_LOG_JSON") {
            config.log_json = parse_env("SETTLEMENT_LOG_JSON", &json)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.scheduler.sweep_interval_secs == 0 {
            return Err(crate::Error::Config(
                "sweep interval must be at least one second".to_string(),
            ));
        }
        if self.gateway.timeout_ms == 0 {
            return Err(crate::Error::Config("gateway timeout must be positive".to_string()));
        }
        if self.gateway.retry.backoff_multiplier < 1.0 {
            return Err(crate::Error::Config(
                "backoff multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gateway.retry.jitter_factor) {
            return Err(crate::Error::Config("jitter factor must be within [0, 1]".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::Config(format!("{} has invalid value '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.timeout(), Duration::from_secs(10));
        assert_eq!(config.scheduler.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            service_name = "settlement"
            service_version = "0.1.0"
            log_json = true

            [ledger]
            data_dir = "/tmp/ledger"
            service_name = "ledger-core"
            service_version = "0.1.0"
            sync_writes = true

            [ledger.rocksdb]
            write_buffer_size_mb = 64
            max_write_buffer_number = 3
            max_background_jobs = 2
            level0_file_num_compaction_trigger = 4
            enable_statistics = false

            [scheduler]
            enabled = false
            sweep_interval_secs = 60

            [gateway]
            timeout_ms = 2500

            [gateway.retry]
            max_retries = 5
            initial_delay_ms = 100
            max_delay_ms = 1000
            backoff_multiplier = 1.5
            jitter_factor = 0.2
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settlement.toml");
        std::fs::write(&path, toml).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.log_json);
        assert!(!config.scheduler.enabled);
        assert_eq!(config.gateway.retry.max_retries, 5);
        assert_eq!(config.ledger.data_dir, PathBuf::from("/tmp/ledger"));
    }

    #[test]
    fn test_invalid_jitter_rejected() {
        let mut config = Config::default();
        config.gateway.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }
}
