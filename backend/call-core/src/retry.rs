//! Bounded retry with exponential backoff.
//!
//! Used around the bulk contact fetch. The schedule comes from
//! `backoff::ExponentialBackoff` with randomization switched off, so the waits
//! are exactly `initial_delay`, `initial_delay * factor`, ... capped at
//! `max_delay`. The attempt budget is counted here; `backoff` only supplies
//! the intervals.

use std::future::Future;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, warn};
use tokio::time::sleep as TokioSleep;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    fn schedule(&self) -> ExponentialBackoff {
        // `backoff` hands out the first interval without applying `max_interval`.
        let first = self.initial_delay.min(self.max_delay);

        ExponentialBackoff {
            current_interval: first,
            initial_interval: first,
            randomization_factor: 0.0,
            multiplier: self.backoff_factor.max(1.0),
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// The waits between attempts, in order. `max_attempts - 1` entries.
    pub fn delays(&self) -> Vec<Duration> {
        let mut schedule = self.schedule();
        (1..self.max_attempts.max(1))
            .filter_map(|_| schedule.next_backoff())
            .collect()
    }

    /// Run `operation` until it succeeds, `should_retry` refuses its error, or
    /// the attempt budget is spent. The last error is returned as-is.
    pub async fn execute_with_retry<T, E, F, Fut, R>(
        &self,
        label: &str,
        mut operation: F,
        should_retry: R,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut schedule = self.schedule();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if attempt > 1 {
                debug!("{label}: attempt {attempt}/{max_attempts}");
            }

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{label}: succeeded on attempt {attempt}/{max_attempts}");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !should_retry(&error) {
                warn!("{label}: giving up on non-retryable error: {error}");
                return Err(error);
            }

            if attempt >= max_attempts {
                warn!("{label}: giving up after {attempt} attempts: {error}");
                return Err(error);
            }

            // With max_elapsed_time unset the schedule never runs dry.
            let delay = schedule.next_backoff().unwrap_or(self.max_delay);
            warn!("{label}: attempt {attempt}/{max_attempts} failed, retrying in {delay:?}: {error}");
            TokioSleep(delay).await;
        }
    }
}
