//! Per-provider request spacing.
//!
//! Each provider instance owns one limiter. `acquire()` waits until at least
//! `60 / requests_per_minute` seconds have passed since the previous
//! `acquire()` returned.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::errors::MarketDataError;

/// Minimum-interval rate limiter for a single provider.
#[derive(Debug)]
pub struct RateLimiter {
    /// Spacing between consecutive requests.
    min_interval: Duration,
    /// When the previous `acquire()` was granted.
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for `requests_per_minute`.
    ///
    /// Zero is rejected rather than turned into an infinite wait.
    pub fn new(requests_per_minute: u32) -> Result<Self, MarketDataError> {
        if requests_per_minute == 0 {
            return Err(MarketDataError::InvalidConfig {
                provider: "rate limiter".to_string(),
                message: "requests_per_minute must be positive".to_string(),
            });
        }
        Ok(Self::with_min_interval(Duration::from_secs_f64(
            60.0 / requests_per_minute as f64,
        )))
    }

    /// Create a limiter with an explicit spacing.
    pub fn with_min_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Lock the grant clock, recovering from poison if necessary.
    ///
    /// A poisoned clock only risks one slightly early request.
    fn lock_last_grant(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_grant.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Wait for the next request slot and claim it.
    ///
    /// The slot is reserved before sleeping, so a caller that is dropped
    /// mid-wait still advances the clock.
    pub async fn acquire(&self) {
        let slot = {
            let mut last = self.lock_last_grant();
            let now = Instant::now();
            let slot = match *last {
                Some(previous) => (previous + self.min_interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        let now = Instant::now();
        if slot > now {
            debug!("Rate limiter: waiting {:?}", slot - now);
            tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
        }
    }

    /// Time until the next slot would be granted, without claiming it.
    pub fn time_until_available(&self) -> Duration {
        let last = self.lock_last_grant();
        match *last {
            Some(previous) => (previous + self.min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}
