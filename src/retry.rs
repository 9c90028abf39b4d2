//! Bounded retry with exponential backoff for calls to the archive services.
//!
//! ESO and SIMBAD have no delivery guarantee; transient failures (timeouts, resets,
//! 5xx, 429) are retried a fixed number of times, permanent ones are returned at once.
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::snrfetch_errors::SnrFetchError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy performing a single attempt.
    pub fn no_retry() -> Self {
        RetryPolicy::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    ///
    /// The delay doubles at each attempt and saturates at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget is spent.
    ///
    /// Arguments
    /// -----------------
    /// * `what`: a short description of the call, used in the logs
    /// * `op`: a closure building a fresh future for each attempt
    ///
    /// Return
    /// ----------
    /// * The first success, the first permanent error, or
    ///   [`SnrFetchError::RetryExhausted`] wrapping the last transient error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, SnrFetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SnrFetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    if max_attempts == 1 {
                        return Err(err);
                    }
                    return Err(SnrFetchError::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{what}: attempt {attempt}/{max_attempts} failed ({err}), retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
