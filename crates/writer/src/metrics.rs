//! Writer metrics
//!
//! Lock-free counters shared between the writer loop and its metrics handle.

use std::sync::{Arc, OnceLock};

use tscl_metrics::{Counter, WriterMetricsProvider, WriterMetricsSnapshot};

use crate::timeout::TimeoutController;

/// Counters updated by the writer loop
#[derive(Debug, Default)]
pub struct WriterMetrics {
    pub entries_written: Counter,
    pub write_failures: Counter,
    /// Subset of `write_failures`
    pub write_timeouts: Counter,
    pub failures_dropped: Counter,
    pub entries_abandoned: Counter,
}

impl WriterMetrics {
    pub const fn new() -> Self {
        Self {
            entries_written: Counter::new(),
            write_failures: Counter::new(),
            write_timeouts: Counter::new(),
            failures_dropped: Counter::new(),
            entries_abandoned: Counter::new(),
        }
    }

    /// Snapshot the counters; the timeout gauge is filled in by the handle
    pub fn snapshot(&self) -> WriterMetricsSnapshot {
        WriterMetricsSnapshot {
            entries_written: self.entries_written.get(),
            write_failures: self.write_failures.get(),
            write_timeouts: self.write_timeouts.get(),
            failures_dropped: self.failures_dropped.get(),
            entries_abandoned: self.entries_abandoned.get(),
            current_timeout_ms: 0,
        }
    }
}

/// Handle for reporting a writer's metrics
///
/// Cheap to clone and valid before and after activation.
#[derive(Clone)]
pub struct WriterMetricsHandle {
    id: String,
    metrics: Arc<WriterMetrics>,
    controller: Arc<OnceLock<Arc<TimeoutController>>>,
}

impl WriterMetricsHandle {
    pub(crate) fn new(
        id: String,
        metrics: Arc<WriterMetrics>,
        controller: Arc<OnceLock<Arc<TimeoutController>>>,
    ) -> Self {
        Self {
            id,
            metrics,
            controller,
        }
    }
}

impl WriterMetricsProvider for WriterMetricsHandle {
    fn writer_id(&self) -> &str {
        &self.id
    }

    fn snapshot(&self) -> WriterMetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        if let Some(controller) = self.controller.get() {
            snapshot.current_timeout_ms = controller.current_timeout().as_millis() as u64;
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeout::TimeoutSettings;

    #[test]
    fn test_snapshot_counts() {
        let metrics = WriterMetrics::new();
        metrics.entries_written.add(5);
        metrics.write_failures.inc();
        metrics.write_timeouts.inc();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_written, 5);
        assert_eq!(snapshot.write_failures, 1);
        assert_eq!(snapshot.write_timeouts, 1);
        assert_eq!(snapshot.current_timeout_ms, 0);
    }

    #[test]
    fn test_handle_reports_timeout_once_active() {
        let controller = Arc::new(OnceLock::new());
        let handle = WriterMetricsHandle::new(
            "metrics".into(),
            Arc::new(WriterMetrics::new()),
            Arc::clone(&controller),
        );
        assert_eq!(handle.writer_id(), "metrics");
        assert_eq!(handle.snapshot().current_timeout_ms, 0);

        let _ = controller.set(Arc::new(TimeoutController::new(TimeoutSettings::default())));
        assert_eq!(handle.snapshot().current_timeout_ms, 10_000);
    }
}
