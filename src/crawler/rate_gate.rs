//! Global request pacing
//!
//! A single `RateGate` is shared by every outbound request of a run, so the
//! aggregate request rate stays bounded no matter how many fetches are in
//! flight.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Longest spacing a gate will enforce, however low the rate
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Enforces a minimum interval between granted requests
#[derive(Debug)]
pub struct RateGate {
    /// `None` when pacing is disabled
    min_interval: Option<Duration>,

    /// When the most recent request was granted
    last_grant: Mutex<Option<Instant>>,
}

impl RateGate {
    /// Creates a gate allowing `requests_per_second` grants per second
    ///
    /// A non-positive rate disables pacing and `wait` returns immediately.
    /// Rates so low that their interval exceeds [`MAX_INTERVAL`] are clamped.
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 && requests_per_second.is_finite() {
            let interval = Duration::try_from_secs_f64(1.0 / requests_per_second)
                .map_or(MAX_INTERVAL, |d| d.min(MAX_INTERVAL));
            Some(interval)
        } else {
            None
        };

        Self {
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    /// A gate that never delays
    pub fn unlimited() -> Self {
        Self::new(0.0)
    }

    /// The enforced spacing between grants, if any
    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Waits until the caller may issue its request
    ///
    /// Grants are serialized: the lock is held across the sleep so concurrent
    /// callers queue behind each other instead of all waking at once.
    pub async fn wait(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let mut last_grant = self.last_grant.lock().await;

        if let Some(last) = *last_grant {
            let ready_at = last + interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last_grant = Some(Instant::now());
    }
}
