//! Writer errors
//!
//! Every per-entry failure is recoverable and reported on the failure queue.
//! Only configuration errors and double activation are returned directly.

use std::time::Duration;

use thiserror::Error;

use crate::entry::Entry;

/// Result type for writer operations
pub type Result<T> = std::result::Result<T, WriterError>;

/// Error reported by an [`Executor`](crate::Executor)
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Could not obtain a connection to the store
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected or failed the statement
    #[error("statement failed: {0}")]
    Statement(String),

    /// The executor gave up at its own deadline
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl ExecuteError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a statement error
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }
}

/// Errors from the table writer
#[derive(Debug, Error)]
pub enum WriterError {
    /// The executor reported an error for an entry
    #[error("failed to write entry: {0}")]
    Execute(#[from] ExecuteError),

    /// The write did not complete within the sampled deadline
    #[error("failed to write entry: timed out after {0:?}")]
    Timeout(Duration),

    /// The writer stopped with entries still queued
    #[error("writer stopped with {count} entries remaining")]
    Abandoned {
        /// Number of entries left in the input queue
        count: usize,
    },

    /// The writer froze after too many consecutive failures
    #[error("writer frozen after {failures} consecutive failures")]
    Frozen {
        /// Length of the failure streak that triggered the freeze
        failures: u32,
    },

    /// Invalid writer or timeout configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// `activate` was called on a writer that is already running
    #[error("writer is already active")]
    AlreadyActive,
}

impl WriterError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from a single entry's write attempt
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::Execute(_) | Self::Timeout(_))
    }
}

/// A failure event delivered on the writer's failure queue
///
/// Write failures carry the entry that failed so the consumer can retry or
/// discard it. Shutdown summaries (`Abandoned`, `Frozen`) carry no entry.
#[derive(Debug)]
pub struct WriteFailure {
    /// The entry that failed, if the failure concerns a single entry
    pub entry: Option<Entry>,

    /// What went wrong
    pub error: WriterError,
}

impl WriteFailure {
    pub(crate) fn for_entry(entry: Entry, error: WriterError) -> Self {
        Self {
            entry: Some(entry),
            error,
        }
    }

    pub(crate) fn summary(error: WriterError) -> Self {
        Self { entry: None, error }
    }
}

impl std::fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{} ({})", self.error, entry),
            None => write!(f, "{}", self.error),
        }
    }
}
