//! tscl - Writer
//!
//! Asynchronous write path for time-stamped metric entries into a relational
//! time-series table.
//!
//! # Architecture
//!
//! ```text
//! [producer] --Entry--> [EntrySender] --> [writer loop] --> [Executor] --> store
//!                                              │
//!                                              └── WriteFailure --> [FailureReceiver]
//! ```
//!
//! The writer loop applies an adaptive per-write timeout: failures shrink it
//! immediately, a background task recovers it toward the baseline while
//! writes keep succeeding.
//!
//! # Example
//!
//! ```ignore
//! use tscl_writer::{TableWriter, WriterOptions};
//!
//! let writer = TableWriter::new(executor, "metrics", "ts", offset);
//! let (entries, mut failures) = writer.activate(cancel.clone(), WriterOptions::default())?;
//!
//! entries.send(writer.new_entry(Utc::now()).float("cpu_load", 0.8)).await?;
//!
//! while let Some(failure) = failures.recv().await {
//!     tracing::warn!(%failure, "write failed");
//! }
//! ```

mod entry;
mod error;
mod executor;
mod metrics;
mod rate_limited;
mod table;
mod timeout;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use entry::{Entry, Value};
pub use error::{ExecuteError, Result, WriteFailure, WriterError};
pub use executor::{Argument, Executor, Statement};
pub use metrics::{WriterMetrics, WriterMetricsHandle};
pub use table::{
    DEFAULT_QUEUE_CAPACITY, EntrySender, FailureReceiver, OverflowPolicy, TableWriter,
    TrySendError, WriterOptions,
};
pub use timeout::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MIN_TIMEOUT, DEFAULT_RECOVERY_FACTOR,
    DEFAULT_RECOVERY_INTERVAL, DEFAULT_TIMEOUT, TimeoutController, TimeoutSettings,
};
