//! Retry strategy for gateway calls: timeout per attempt, exponential backoff with jitter

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry (ms)
    pub initial_delay_ms: u64,

    /// Delay cap (ms)
    pub max_delay_ms: u64,

    /// Growth factor per retry
    pub backoff_multiplier: f64,

    /// ± share of the delay randomized (0.1 = 10%)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Runs gateway calls with a per-attempt timeout and retries retryable failures
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
    call_timeout: Duration,
}

impl RetryStrategy {
    /// Create strategy
    pub fn new(config: RetryConfig, call_timeout: Duration) -> Self {
        Self {
            config,
            call_timeout,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay =
            self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);

        // Cap at max_delay
        let capped_delay = base_delay.min(self.config.max_delay_ms as f64);

        let jitter_range = capped_delay * self.config.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
        let final_delay = (capped_delay + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }

    /// Execute `operation` until it succeeds, fails permanently, or retries run out
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut attempt = 0;

        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(format!(
                    "{} exceeded {:?}",
                    operation_name, self.call_timeout
                ))),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            "Operation {} succeeded on retry attempt {}/{}",
                            operation_name, attempt, self.config.max_retries
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    warn!("Non-retryable error for {}: {}", operation_name, e);
                    return Err(e);
                }
                Err(e) if attempt >= self.config.max_retries => {
                    warn!(
                        "Giving up on {} after {} attempts: {}",
                        operation_name,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.calculate_delay(attempt);
                    attempt += 1;
                    warn!(
                        "Attempt {}/{} failed for {}: {}; retrying after {:?}",
                        attempt,
                        self.config.max_retries + 1,
                        operation_name,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let strategy = RetryStrategy::new(config, Duration::from_secs(1));

        assert_eq!(strategy.calculate_delay(0).as_millis(), 1000);
        assert_eq!(strategy.calculate_delay(1).as_millis(), 2000);
        assert_eq!(strategy.calculate_delay(2).as_millis(), 4000);
    }

    #[test]
    fn test_max_delay_cap() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let strategy = RetryStrategy::new(config, Duration::from_secs(1));
        assert!(strategy.calculate_delay(10).as_millis() <= 5000);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 1000,
            jitter_factor: 0.1,
            ..fast_config(3)
        };
        let strategy = RetryStrategy::new(config, Duration::from_secs(1));
        for _ in 0..100 {
            let ms = strategy.calculate_delay(0).as_millis();
            assert!((900..=1100).contains(&ms));
        }
    }

    #[tokio::test]
    async fn test_retries_retryable_until_success() {
        let strategy = RetryStrategy::new(fast_config(3), Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));

        let result = strategy
            .execute("create_payout", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(GatewayError::Unavailable("503".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let strategy = RetryStrategy::new(fast_config(3), Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = strategy
            .execute("create_payout", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Rejected("closed account".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retryable() {
        let strategy = RetryStrategy::new(fast_config(1), Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = strategy
            .execute("create_payout", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
