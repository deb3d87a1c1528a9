//! Retry logic with exponential backoff
//!
//! Submissions and uploads are wrapped in [`with_retry`]. Whether a failure
//! is worth another attempt is decided by [`Error::class`]: transport faults
//! and unrecognized API rejections are retried, the fixed set of
//! configuration-level rejections (bad workflow id, bad API key, no balance)
//! abort immediately.
//!
//! # Example
//!
//! ```no_run
//! use runninghub_client::config::RetryConfig;
//! use runninghub_client::retry::with_retry;
//! use runninghub_client::Error;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let id = with_retry(&config, "submit task", || async {
//!     Ok::<String, Error>("task-1".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FaultClass, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Execute an async operation with exponential backoff retry logic
///
/// `config.max_attempts` is the total number of attempts. The delay after the
/// n-th failed attempt is `initial_delay * backoff_multiplier^(n-1)`, capped
/// at `max_delay` (1 s, 2 s, 4 s, 8 s with the defaults).
///
/// # Returns
///
/// The first successful result. A fatal error is returned unchanged after a
/// single attempt; when the budget runs out the last error is wrapped in
/// [`Error::RetryExhausted`].
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match op().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(operation, attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.class() != FaultClass::Retryable => {
                tracing::error!(
                    operation,
                    error = %e,
                    "operation failed with non-retryable error"
                );
                return Err(e);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    operation,
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                tracing::error!(
                    operation,
                    error = %e,
                    attempts = attempt,
                    "operation failed after all retry attempts exhausted"
                );
                return Err(Error::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
        }
    }
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
