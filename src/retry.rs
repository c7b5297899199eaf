//! Retry with exponential backoff for remote reads.

use crate::config::Config;
use crate::error::RemoteError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry schedule: `max_attempts` tries, sleeping
/// `base_delay * 2^n` after the n-th (zero-based) failed attempt.
///
/// Only failures with a transient signature are retried; everything else is
/// returned after the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(300))
    }
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `f` until it succeeds, fails permanently, or attempts run out.
    /// The last failure is returned as-is.
    pub async fn call<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;

        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded on attempt {}", operation, attempt + 1);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let Some(signature) = err.transient_signature() else {
                        debug!("{} failed permanently: {}", operation, err);
                        return Err(err);
                    };

                    if attempt + 1 >= self.max_attempts {
                        warn!("{} gave up after {} attempts: {}", operation, attempt + 1, err);
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} attempt {} failed ({}), retrying in {:?}",
                        operation,
                        attempt + 1,
                        signature,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
