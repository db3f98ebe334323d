//! Adaptive write timeout
//!
//! The controller tracks the deadline given to each write. Failures shrink it
//! immediately; a background task grows it back toward the baseline on a fixed
//! schedule, but only while writes have recently succeeded.
//!
//! ```text
//! failure:  current = max(floor, current / backoff_factor)
//! tick:     if now - last_success <= 2 * recovery_interval
//!               current = min(baseline, current * recovery_factor)
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WriterError};

// =============================================================================
// Defaults
// =============================================================================

/// Default per-write timeout ceiling
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-write timeout floor
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default divisor applied on failure
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;

/// Default multiplier applied on recovery
pub const DEFAULT_RECOVERY_FACTOR: f64 = 1.2;

/// Default period of the recovery task
pub const DEFAULT_RECOVERY_INTERVAL: Duration = Duration::from_secs(10);

// =============================================================================
// Settings
// =============================================================================

/// Timeout controller settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutSettings {
    /// Ceiling and starting value
    pub baseline: Duration,

    /// The timeout never shrinks below this
    pub floor: Duration,

    /// Divisor applied on each failure (> 1)
    pub backoff_factor: f64,

    /// Multiplier applied on each recovery tick (> 1)
    pub recovery_factor: f64,

    /// Period of the recovery task
    pub recovery_interval: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            baseline: DEFAULT_TIMEOUT,
            floor: DEFAULT_MIN_TIMEOUT,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            recovery_factor: DEFAULT_RECOVERY_FACTOR,
            recovery_interval: DEFAULT_RECOVERY_INTERVAL,
        }
    }
}

impl TimeoutSettings {
    /// Set the baseline timeout
    pub fn with_baseline(mut self, baseline: Duration) -> Self {
        self.baseline = baseline;
        self
    }

    /// Set the timeout floor
    pub fn with_floor(mut self, floor: Duration) -> Self {
        self.floor = floor;
        self
    }

    /// Set the backoff factor
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the recovery factor
    pub fn with_recovery_factor(mut self, factor: f64) -> Self {
        self.recovery_factor = factor;
        self
    }

    /// Set the recovery interval
    pub fn with_recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery_interval = interval;
        self
    }

    /// Reject settings that would invert or stall the control law
    pub fn validate(&self) -> Result<()> {
        if !(self.backoff_factor.is_finite() && self.backoff_factor > 1.0) {
            return Err(WriterError::config(format!(
                "backoff factor must be greater than 1, got {}",
                self.backoff_factor
            )));
        }
        if !(self.recovery_factor.is_finite() && self.recovery_factor > 1.0) {
            return Err(WriterError::config(format!(
                "recovery factor must be greater than 1, got {}",
                self.recovery_factor
            )));
        }
        if self.floor.is_zero() {
            return Err(WriterError::config("timeout floor must be non-zero"));
        }
        if self.floor > self.baseline {
            return Err(WriterError::config(format!(
                "timeout floor {:?} exceeds baseline {:?}",
                self.floor, self.baseline
            )));
        }
        if self.recovery_interval.is_zero() {
            return Err(WriterError::config("recovery interval must be non-zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Controller
// =============================================================================

#[derive(Debug)]
struct State {
    current: Duration,
    last_success: Instant,
}

/// Adaptive per-write timeout
///
/// Invariant: `floor <= current <= baseline`. Both mutable fields sit behind a
/// single lock; the writer loop only takes the read side.
#[derive(Debug)]
pub struct TimeoutController {
    settings: TimeoutSettings,
    state: RwLock<State>,
}

impl TimeoutController {
    /// Create a controller starting at the baseline.
    ///
    /// Settings are expected to be validated by the caller.
    pub fn new(settings: TimeoutSettings) -> Self {
        Self {
            state: RwLock::new(State {
                current: settings.baseline,
                last_success: Instant::now(),
            }),
            settings,
        }
    }

    pub fn settings(&self) -> &TimeoutSettings {
        &self.settings
    }

    /// The deadline for the next write
    pub fn current_timeout(&self) -> Duration {
        self.state.read().current
    }

    /// When the last successful write was reported
    pub fn last_success(&self) -> Instant {
        self.state.read().last_success
    }

    /// Record a successful write. Does not change the timeout.
    pub fn report_success(&self) {
        self.state.write().last_success = Instant::now();
    }

    /// Shrink the timeout after a failed write
    pub fn report_failure(&self) {
        let mut state = self.state.write();
        let shrunk = state.current.div_f64(self.settings.backoff_factor);
        state.current = shrunk.max(self.settings.floor);
        tracing::debug!(
            timeout_ms = state.current.as_millis() as u64,
            "write failed, timeout reduced"
        );
    }

    /// Grow the timeout toward the baseline if writes recently succeeded
    pub fn attempt_recovery(&self) {
        self.attempt_recovery_at(Instant::now());
    }

    fn attempt_recovery_at(&self, now: Instant) {
        let mut state = self.state.write();

        // No recent success: the store is still degraded
        let quiet = now.saturating_duration_since(state.last_success);
        if quiet > self.settings.recovery_interval * 2 {
            tracing::trace!(
                quiet_ms = quiet.as_millis() as u64,
                "no recent success, skipping timeout recovery"
            );
            return;
        }

        if state.current >= self.settings.baseline {
            return;
        }
        // Saturate at the baseline instead of overflowing `Duration`
        let grown = Duration::try_from_secs_f64(
            state.current.as_secs_f64() * self.settings.recovery_factor,
        )
        .unwrap_or(self.settings.baseline);
        state.current = grown.min(self.settings.baseline);
        tracing::debug!(
            timeout_ms = state.current.as_millis() as u64,
            "timeout recovered"
        );
    }

    /// Spawn the periodic recovery task, stopped by `cancel`
    pub fn spawn_recovery(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.settings.recovery_interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => self.attempt_recovery(),
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "timeout_test.rs"]
mod timeout_test;
