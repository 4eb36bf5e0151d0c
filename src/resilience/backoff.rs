//! Exponential backoff with jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::error::ControlPlaneError;

/// Backoff tuning for one retried operation.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the second attempt.
    pub initial_interval: Duration,
    /// Growth factor between attempts.
    pub multiplier: f64,
    /// Upper bound on a single delay.
    pub max_interval: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
        }
    }
}

impl BackoffConfig {
    pub fn with_initial_interval(initial_interval: Duration) -> Self {
        Self { initial_interval, ..Default::default() }
    }
}

/// Delay to sleep after the given failed attempt (1-based).
pub fn calculate_backoff(attempt: u32, config: &BackoffConfig) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let base = config.initial_interval.as_secs_f64() * config.multiplier.powi(exponent);
    let capped = base.min(config.max_interval.as_secs_f64());

    // Jitter: 0.5x to 1.5x of the delay
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64(capped * jitter)
}

/// Retry `operation` until it succeeds or fails with a non-retryable error.
///
/// There is no attempt limit; callers bound the loop with a deadline.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &BackoffConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ControlPlaneError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ControlPlaneError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                error!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    "Operation failed with a terminal error"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = calculate_backoff(attempt, config);
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
