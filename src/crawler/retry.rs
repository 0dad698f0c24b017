//! Bounded retry with exponential backoff
//!
//! `RetryPolicy` wraps a fallible operation. Failures that classify themselves
//! as retryable (see [`Retryable`]) are retried after `d`, `d*b`, `d*b^2`, ...
//! until the attempt budget is spent; the final failure is returned to the
//! caller. The same policy drives async operations (`run`) and blocking ones
//! (`run_blocking`).

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classification of failures for retry purposes
pub trait Retryable {
    /// Whether another attempt could plausibly succeed
    fn is_retryable(&self) -> bool;
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::Interrupted
                | ErrorKind::TimedOut
                | ErrorKind::WouldBlock
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
        )
    }
}

/// Retry settings shared by all call sites of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff: f64,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` total attempts
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff: if backoff.is_finite() && backoff >= 1.0 { backoff } else { 1.0 },
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff,
        )
        .with_max_delay(Duration::from_millis(config.max_delay_ms))
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// Caps every individual delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff.powi(retry.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Runs an async operation under this policy
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(operation, attempt, &err) {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return Err(err),
                },
            }
            attempt += 1;
        }
    }

    /// Runs a blocking operation under this policy
    pub fn run_blocking<T, E, F>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(operation, attempt, &err) {
                    Some(delay) => std::thread::sleep(delay),
                    None => return Err(err),
                },
            }
            attempt += 1;
        }
    }

    /// Decides whether failed attempt number `attempt` (1-based) is retried
    fn next_delay<E: Retryable + Display>(
        &self,
        operation: &str,
        attempt: u32,
        err: &E,
    ) -> Option<Duration> {
        if !err.is_retryable() {
            tracing::debug!(operation, attempt, error = %err, "Non-retryable failure");
            return None;
        }

        if attempt >= self.max_attempts {
            tracing::error!(
                operation,
                attempts = attempt,
                error = %err,
                "Giving up after {} attempts",
                attempt
            );
            return None;
        }

        let delay = self.delay_for(attempt - 1);
        tracing::warn!(
            operation,
            attempt,
            max_attempts = self.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        Some(delay)
    }
}
