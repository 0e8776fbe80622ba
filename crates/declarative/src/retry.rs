//! Bounded retry with exponential backoff for transient backend errors.

use crate::backend::BackendError;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Retry policy for backend operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (1 means no retry)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::try_from_secs_f64(capped).unwrap_or(Duration::ZERO)
    }

    /// A config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback trait for retry notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of the next attempt (`attempt` is 1-indexed).
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &BackendError, delay: Duration);
}

/// Callback that logs retries through the `log` facade.
pub struct LogRetry<'a> {
    pub resource_id: &'a str,
}

impl RetryCallback for LogRetry<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &BackendError, delay: Duration) {
        log::warn!(
            "{}: attempt {}/{} failed: {}. Retrying in {:.1}s",
            self.resource_id,
            attempt,
            max_attempts,
            error,
            delay.as_secs_f64()
        );
    }
}

/// Execute a backend operation with retry logic.
///
/// Only retryable errors are retried; the last error is returned once all
/// attempts are used up.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Result<T, BackendError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay);
                }
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
