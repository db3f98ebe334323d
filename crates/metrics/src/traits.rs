//! Metrics provider trait
//!
//! The table writer implements [`WriterMetricsProvider`] through a handle so
//! the reporter can collect its counters without knowing the concrete type.

use serde::Serialize;

/// Point-in-time snapshot of writer metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterMetricsSnapshot {
    /// Entries written successfully
    pub entries_written: u64,
    /// Entries the executor failed (including timeouts)
    pub write_failures: u64,
    /// Subset of failures caused by the deadline elapsing
    pub write_timeouts: u64,
    /// Failure events that could not be delivered on the failure queue
    pub failures_dropped: u64,
    /// Entries left in the input queue at shutdown
    pub entries_abandoned: u64,
    /// Deadline currently given to each write
    pub current_timeout_ms: u64,
}

/// Trait for writers to provide metrics to the reporter
pub trait WriterMetricsProvider: Send + Sync {
    /// Identifier for this writer instance (usually the table name)
    fn writer_id(&self) -> &str;

    /// Get a snapshot of current metrics
    fn snapshot(&self) -> WriterMetricsSnapshot;
}
