//! Rate-limited warning logger
//!
//! A saturated failure queue drops events on every write. This logs the
//! condition at most once per interval, with the number of events suppressed
//! since the previous line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between warnings
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

pub(crate) struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    /// Events since the last emitted line
    pending: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedLogger {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record an event and log if the interval has passed.
    ///
    /// Returns true if a line was emitted.
    pub(crate) fn warn(&self, message: &str, error: &dyn std::fmt::Display) -> bool {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);

        let should_log = {
            let mut last_time = self.last_log_time.lock();
            let now = Instant::now();
            match *last_time {
                Some(last) if now.duration_since(last) < self.min_interval => false,
                _ => {
                    *last_time = Some(now);
                    true
                }
            }
        };

        if !should_log {
            return false;
        }

        let count = self.pending.swap(0, Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        if count > 1 {
            tracing::warn!(
                error = %error,
                suppressed_count = count - 1,
                total,
                "{message} (rate-limited)"
            );
        } else {
            tracing::warn!(error = %error, total, "{message}");
        }
        true
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}
