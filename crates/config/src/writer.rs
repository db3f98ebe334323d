//! Writer configuration
//!
//! Destination table, queue sizing and the adaptive timeout knobs.

use chrono::FixedOffset;
use serde::Deserialize;
use std::time::Duration;

/// What the writer does when the failure queue is full
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnFull {
    /// Drop the failure event and count it (default)
    #[default]
    Drop,
    /// Wait for the consumer to make room
    Block,
}

/// Adaptive timeout configuration
///
/// ```toml
/// [writer.timeout]
/// baseline = "10s"
/// floor = "1s"
/// backoff_factor = 1.5
/// recovery_factor = 1.2
/// recovery_interval = "10s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ceiling and starting per-write timeout
    #[serde(with = "humantime_serde")]
    pub baseline: Duration,

    /// The timeout never drops below this
    #[serde(with = "humantime_serde")]
    pub floor: Duration,

    /// Divisor applied on each failed write
    pub backoff_factor: f64,

    /// Multiplier applied on each recovery tick
    pub recovery_factor: f64,

    /// How often recovery is attempted
    #[serde(with = "humantime_serde")]
    pub recovery_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            baseline: Duration::from_secs(10),
            floor: Duration::from_secs(1),
            backoff_factor: 1.5,
            recovery_factor: 1.2,
            recovery_interval: Duration::from_secs(10),
        }
    }
}

/// Writer configuration
///
/// ```toml
/// [writer]
/// table = "metrics"
/// timestamp_column = "ts"
/// utc_offset = "+02:00"
/// queue_capacity = 100
/// on_full = "drop"
/// # max_consecutive_failures = 50
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Destination table (required)
    pub table: String,

    /// Column receiving each entry's timestamp
    pub timestamp_column: String,

    /// Offset bound into every entry's timestamp, e.g. "+02:00"
    pub utc_offset: String,

    /// Capacity of the entry queue and of the failure queue
    pub queue_capacity: usize,

    /// Failure queue overflow policy
    pub on_full: OnFull,

    /// Freeze the writer after this many consecutive failures (off by default)
    pub max_consecutive_failures: Option<u32>,

    pub timeout: TimeoutConfig,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            table: String::new(),
            timestamp_column: "ts".into(),
            utc_offset: "+00:00".into(),
            queue_capacity: 100,
            on_full: OnFull::Drop,
            max_consecutive_failures: None,
            timeout: TimeoutConfig::default(),
        }
    }
}

impl WriterConfig {
    /// Parse `utc_offset`; `Z` and `UTC` are accepted as zero
    pub fn offset(&self) -> Option<FixedOffset> {
        match self.utc_offset.trim() {
            "Z" | "z" | "UTC" | "utc" => FixedOffset::east_opt(0),
            other => other.parse::<FixedOffset>().ok(),
        }
    }
}
