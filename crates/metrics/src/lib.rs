//! tscl - Metrics
//!
//! Writer metrics collection and periodic reporting.
//!
//! # Metrics Handle Pattern
//!
//! The table writer keeps its counters in an `Arc` and hands out a lightweight
//! handle implementing [`WriterMetricsProvider`]. The handle stays valid while
//! the writer loop runs in its own task.
//!
//! ```text
//! TableWriter (owns Arc<WriterMetrics>)
//!     │
//!     ├──► metrics_handle() → handle (clones Arc, implements provider trait)
//!     │
//!     └──► activate() [spawns loop, Arc keeps metrics alive]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tscl_metrics::{WriterMetricsProvider, WriterReporter};
//!
//! let handle: Arc<dyn WriterMetricsProvider> = Arc::new(writer.metrics_handle());
//! let reporter = WriterReporter::new(handle, MetricsFormat::Human, interval);
//! tokio::spawn(reporter.run(cancel.clone()));
//! ```

pub mod format;
mod reporter;
mod traits;

pub use format::{HumanFormatter, JsonFormatter, MetricsFormatter};
pub use reporter::WriterReporter;
pub use traits::{WriterMetricsProvider, WriterMetricsSnapshot};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment the counter by `val` (relaxed ordering for performance)
    #[inline]
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Increment the counter by 1
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset the counter to 0 and return the previous value
    #[inline]
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}
