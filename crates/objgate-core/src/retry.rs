//! Client retry with exponential backoff and jitter.
//!
//! Used by [`crate::GatewayClient::connect_with_retry`] to ride out a busy
//! server: each failed attempt waits `base_delay * 2^attempt` (capped at
//! `max_delay`), scaled by a random factor in `0.5..1.5` when jitter is on.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff policy for retried operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given failed attempt (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let max_secs = self.max_delay.as_secs_f64();
        let secs = (self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32)).min(max_secs);
        let secs = if self.jitter {
            (secs * rand::rng().random_range(0.5..1.5)).min(max_secs)
        } else {
            secs
        };
        Duration::from_secs_f64(secs)
    }
}

/// Outcome of [`retry_async`].
#[derive(Debug)]
pub struct Retried<T, E> {
    pub result: Result<T, E>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Total time spent sleeping between attempts.
    pub waited: Duration,
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `config.max_attempts` is reached.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> Retried<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut waited = Duration::ZERO;
    let mut attempt = 0;

    loop {
        let result = operation().await;
        attempt += 1;

        let err = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Succeeded after {} attempts", attempt);
                }
                return Retried {
                    result: Ok(value),
                    attempts: attempt,
                    waited,
                };
            }
            Err(e) => e,
        };

        if !should_retry(&err) || attempt >= max_attempts {
            if attempt >= max_attempts {
                warn!("Giving up after {} attempts: {}", attempt, err);
            }
            return Retried {
                result: Err(err),
                attempts: attempt,
                waited,
            };
        }

        let delay = config.delay_for(attempt - 1);
        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt, max_attempts, err, delay
        );
        waited += delay;
        tokio::time::sleep(delay).await;
    }
}
