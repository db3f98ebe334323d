//! Table writer
//!
//! Serializes entries for one table through a single background loop.
//!
//! ```text
//! producers ──Entry──► [entry queue] ──► writer loop ──► Executor ──► store
//!                                            │
//!                                            ├── ok:   controller.report_success()
//!                                            └── err:  [failure queue] + controller.report_failure()
//! ```
//!
//! Each write gets the controller's current timeout, sampled fresh per entry.
//! Writes are strictly sequential, so entries reach the store (and failures
//! reach the failure queue) in the order they were accepted.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tscl_metrics::WriterMetricsProvider;

use crate::entry::Entry;
use crate::error::{ExecuteError, Result, WriteFailure, WriterError};
use crate::executor::Executor;
use crate::metrics::{WriterMetrics, WriterMetricsHandle};
use crate::rate_limited::RateLimitedLogger;
use crate::timeout::{TimeoutController, TimeoutSettings};

pub use tokio::sync::mpsc::error::TrySendError;

/// Default capacity of the entry and failure queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Failure queue slots held back for the shutdown summaries (frozen, abandoned)
const SUMMARY_SLOTS: usize = 2;

/// Receiving side of the failure queue
///
/// The queue holds `queue_capacity` failure events plus room for the shutdown
/// summaries, so a full queue never swallows the final report.
pub type FailureReceiver = mpsc::Receiver<WriteFailure>;

// =============================================================================
// Options
// =============================================================================

/// What the writer does when the failure queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the failure event and count it in `failures_dropped`
    #[default]
    Drop,
    /// Wait for room; the writer stalls behind a slow consumer
    ///
    /// Cancellation still interrupts the wait. A failure that could not be
    /// delivered by then is counted in the abandoned summary.
    Block,
}

/// Activation options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriterOptions {
    pub timeout: TimeoutSettings,

    /// Capacity of both the entry queue and the failure queue
    pub queue_capacity: usize,

    pub on_full: OverflowPolicy,

    /// Stop the writer after this many consecutive failed writes
    pub max_consecutive_failures: Option<u32>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            timeout: TimeoutSettings::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            on_full: OverflowPolicy::Drop,
            max_consecutive_failures: None,
        }
    }
}

impl WriterOptions {
    /// Set the baseline (maximum) per-write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout.baseline = timeout;
        self
    }

    /// Set the minimum per-write timeout
    pub fn with_min_timeout(mut self, timeout: Duration) -> Self {
        self.timeout.floor = timeout;
        self
    }

    /// Replace all timeout settings
    pub fn with_timeout_settings(mut self, settings: TimeoutSettings) -> Self {
        self.timeout = settings;
        self
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the failure queue overflow policy
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.on_full = policy;
        self
    }

    /// Freeze the writer after `n` consecutive failures
    pub fn with_max_consecutive_failures(mut self, n: u32) -> Self {
        self.max_consecutive_failures = Some(n);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(WriterError::config("queue capacity must be at least 1"));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(WriterError::config(
                "max consecutive failures must be at least 1",
            ));
        }
        self.timeout.validate()
    }
}

// =============================================================================
// Entry sender
// =============================================================================

/// Producer side of the entry queue
///
/// Cloneable; the writer loop stops on its own once every sender is dropped.
#[derive(Debug, Clone)]
pub struct EntrySender {
    sender: mpsc::Sender<Entry>,
}

impl EntrySender {
    /// Send an entry, waiting while the queue is full
    ///
    /// Returns the entry back if the writer has stopped.
    pub async fn send(&self, entry: Entry) -> std::result::Result<(), Entry> {
        self.sender.send(entry).await.map_err(|e| e.0)
    }

    /// Send an entry without waiting
    ///
    /// `TrySendError::Full` is the signal to shed load upstream; the entry is
    /// handed back either way.
    pub fn try_send(&self, entry: Entry) -> std::result::Result<(), TrySendError<Entry>> {
        self.sender.try_send(entry)
    }

    /// Free slots in the queue
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Whether the writer has stopped accepting entries
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// =============================================================================
// Table writer
// =============================================================================

/// Asynchronous writer for one time-series table
///
/// Constructed inert; [`activate`](Self::activate) starts the loop. A writer
/// can be activated once.
pub struct TableWriter {
    executor: Arc<dyn Executor>,
    table: String,
    ts_column: String,
    offset: FixedOffset,
    controller: Arc<OnceLock<Arc<TimeoutController>>>,
    metrics: Arc<WriterMetrics>,
}

impl TableWriter {
    /// Create a writer for `table`, stamping entries in `offset`
    pub fn new(
        executor: Arc<dyn Executor>,
        table: impl Into<String>,
        ts_column: impl Into<String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            executor,
            table: table.into(),
            ts_column: ts_column.into(),
            offset,
            controller: Arc::new(OnceLock::new()),
            metrics: Arc::new(WriterMetrics::new()),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn timestamp_column(&self) -> &str {
        &self.ts_column
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Create an entry stamped with `ts` in this writer's offset
    pub fn new_entry<Tz: TimeZone>(&self, ts: DateTime<Tz>) -> Entry {
        Entry::new(ts.with_timezone(&self.offset))
    }

    pub fn is_active(&self) -> bool {
        self.controller.get().is_some()
    }

    /// The deadline the next write will get, once active
    pub fn current_timeout(&self) -> Option<Duration> {
        self.controller.get().map(|c| c.current_timeout())
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> WriterMetricsHandle {
        WriterMetricsHandle::new(
            self.table.clone(),
            Arc::clone(&self.metrics),
            Arc::clone(&self.controller),
        )
    }

    /// Start the writer.
    ///
    /// Allocates the entry and failure queues, starts the timeout recovery
    /// task and the writer loop. Both stop when `cancel` is cancelled; the
    /// failure queue closes once the loop has reported any abandoned entries.
    pub fn activate(
        &self,
        cancel: CancellationToken,
        options: WriterOptions,
    ) -> Result<(EntrySender, FailureReceiver)> {
        options.validate()?;

        let controller = Arc::new(TimeoutController::new(options.timeout));
        self.controller
            .set(Arc::clone(&controller))
            .map_err(|_| WriterError::AlreadyActive)?;

        let (entry_tx, entry_rx) = mpsc::channel(options.queue_capacity);
        let (failure_tx, failure_rx) =
            mpsc::channel(options.queue_capacity.saturating_add(SUMMARY_SLOTS));
        let summary_slots = (0..SUMMARY_SLOTS)
            .filter_map(|_| failure_tx.clone().try_reserve_owned().ok())
            .collect();

        // Child scope so a loop that ends on its own also stops recovery
        let scope = cancel.child_token();
        Arc::clone(&controller).spawn_recovery(scope.clone());

        info!(
            table = %self.table,
            queue_capacity = options.queue_capacity,
            timeout_ms = options.timeout.baseline.as_millis() as u64,
            min_timeout_ms = options.timeout.floor.as_millis() as u64,
            "table writer starting"
        );

        let writer_loop = WriterLoop {
            executor: Arc::clone(&self.executor),
            table: self.table.clone(),
            ts_column: self.ts_column.clone(),
            controller,
            metrics: Arc::clone(&self.metrics),
            handle: self.metrics_handle(),
            receiver: entry_rx,
            failures: failure_tx,
            summary_slots,
            undelivered: 0,
            on_full: options.on_full,
            max_consecutive_failures: options.max_consecutive_failures,
            consecutive_failures: 0,
            overflow_log: RateLimitedLogger::default(),
            scope,
        };
        tokio::spawn(writer_loop.run());

        Ok((EntrySender { sender: entry_tx }, failure_rx))
    }
}

impl std::fmt::Debug for TableWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableWriter")
            .field("table", &self.table)
            .field("ts_column", &self.ts_column)
            .field("offset", &self.offset)
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// Writer loop
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Freeze(u32),
}

struct WriterLoop {
    executor: Arc<dyn Executor>,
    table: String,
    ts_column: String,
    controller: Arc<TimeoutController>,
    metrics: Arc<WriterMetrics>,
    handle: WriterMetricsHandle,
    receiver: mpsc::Receiver<Entry>,
    failures: mpsc::Sender<WriteFailure>,
    /// Reserved at activation, spent only by `drain`
    summary_slots: Vec<mpsc::OwnedPermit<WriteFailure>>,
    /// Failed entries whose event was cut off by cancellation under `Block`
    undelivered: usize,
    on_full: OverflowPolicy,
    max_consecutive_failures: Option<u32>,
    consecutive_failures: u32,
    overflow_log: RateLimitedLogger,
    scope: CancellationToken,
}

impl WriterLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.scope.cancelled() => {
                    self.drain(None);
                    break;
                }
                entry = self.receiver.recv() => match entry {
                    Some(entry) => {
                        if let Flow::Freeze(failures) = self.write(entry).await {
                            self.drain(Some(failures));
                            break;
                        }
                    }
                    // Every sender dropped and the queue is empty
                    None => break,
                }
            }
        }

        self.scope.cancel();

        let snapshot = self.handle.snapshot();
        info!(
            table = %self.table,
            written = snapshot.entries_written,
            failed = snapshot.write_failures,
            timeouts = snapshot.write_timeouts,
            dropped = snapshot.failures_dropped,
            abandoned = snapshot.entries_abandoned,
            "table writer stopped"
        );
        // Dropping self closes the failure queue
    }

    /// Write one entry under the current deadline
    async fn write(&mut self, entry: Entry) -> Flow {
        let statement = entry.render(&self.table, &self.ts_column);
        let deadline = self.controller.current_timeout();

        let outcome =
            match tokio::time::timeout(deadline, self.executor.execute(&statement, deadline)).await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(ExecuteError::DeadlineExceeded(d))) => Err(WriterError::Timeout(d)),
                Ok(Err(e)) => Err(WriterError::Execute(e)),
                Err(_) => Err(WriterError::Timeout(deadline)),
            };

        match outcome {
            Ok(()) => {
                self.controller.report_success();
                self.metrics.entries_written.inc();
                self.consecutive_failures = 0;
                Flow::Continue
            }
            Err(error) => {
                self.metrics.write_failures.inc();
                if matches!(error, WriterError::Timeout(_)) {
                    self.metrics.write_timeouts.inc();
                }
                debug!(
                    table = %self.table,
                    timeout_ms = deadline.as_millis() as u64,
                    error = %error,
                    "write failed"
                );

                self.report(WriteFailure::for_entry(entry, error)).await;
                self.controller.report_failure();

                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                match self.max_consecutive_failures {
                    Some(max) if self.consecutive_failures >= max => Flow::Freeze(max),
                    _ => Flow::Continue,
                }
            }
        }
    }

    /// Deliver a failure event according to the overflow policy
    async fn report(&mut self, failure: WriteFailure) {
        match self.on_full {
            OverflowPolicy::Drop => self.report_now(failure),
            OverflowPolicy::Block => {
                let delivered = tokio::select! {
                    biased;
                    sent = self.failures.send(failure) => {
                        if sent.is_err() {
                            // Consumer dropped the receiver
                            self.metrics.failures_dropped.inc();
                        }
                        true
                    }
                    _ = self.scope.cancelled() => false,
                };
                if !delivered {
                    self.undelivered += 1;
                }
            }
        }
    }

    /// Best-effort delivery without waiting
    fn report_now(&self, failure: WriteFailure) {
        match self.failures.try_send(failure) {
            Ok(()) => {}
            Err(TrySendError::Full(failure)) => {
                self.metrics.failures_dropped.inc();
                self.overflow_log
                    .warn("failure queue full, dropping failure event", &failure.error);
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.failures_dropped.inc();
            }
        }
    }

    /// Deliver a shutdown summary through a reserved slot
    fn report_summary(&mut self, failure: WriteFailure) {
        match self.summary_slots.pop() {
            Some(permit) => {
                permit.send(failure);
            }
            None => self.report_now(failure),
        }
    }

    /// Stop accepting entries and report what is left behind
    fn drain(&mut self, frozen_after: Option<u32>) {
        self.receiver.close();
        let mut remaining = std::mem::take(&mut self.undelivered);
        while self.receiver.try_recv().is_ok() {
            remaining += 1;
        }

        if let Some(failures) = frozen_after {
            warn!(
                table = %self.table,
                failures,
                "too many consecutive failures, freezing writer"
            );
            self.report_summary(WriteFailure::summary(WriterError::Frozen { failures }));
        }

        if remaining > 0 {
            self.metrics.entries_abandoned.add(remaining as u64);
            warn!(
                table = %self.table,
                remaining,
                "writer stopping with entries remaining"
            );
            self.report_summary(WriteFailure::summary(WriterError::Abandoned {
                count: remaining,
            }));
        }
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod table_test;
