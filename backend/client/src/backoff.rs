//! Exponential backoff for the pre-flight health probe.
//!
//! Attempts run strictly one after another; the delay after failed attempt `n`
//! (0-indexed) is `base_delay * multiplier^n`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Backoff policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Growth factor for each subsequent delay.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after failed attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(millis.round() as u64)
    }

    /// The full delay schedule, one entry per attempt.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

/// Run `op` until it succeeds or the policy is exhausted, returning the last error.
///
/// `op` receives the 0-indexed attempt number. There is no sleep after the final attempt.
pub async fn with_backoff<F, Fut, T, E>(policy: &BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= max_attempts => {
                warn!(attempts = max_attempts, error = %e, "Backoff exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
