//! Human-readable formatter

use super::{MetricsFormatter, format_count, format_millis};
use crate::WriterMetricsSnapshot;

/// One-line report per writer
#[derive(Debug, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsFormatter for HumanFormatter {
    fn format_writer(
        &self,
        writer_id: &str,
        snapshot: &WriterMetricsSnapshot,
        interval_secs: u64,
    ) -> String {
        let mut output = format!(
            "[writer:{}] period: {}s | written: {} | failed: {} (timeouts: {}) | timeout: {}",
            writer_id,
            interval_secs,
            format_count(snapshot.entries_written),
            format_count(snapshot.write_failures),
            snapshot.write_timeouts,
            format_millis(snapshot.current_timeout_ms),
        );

        if snapshot.failures_dropped > 0 {
            output.push_str(&format!(" | dropped: {}", snapshot.failures_dropped));
        }
        if snapshot.entries_abandoned > 0 {
            output.push_str(&format!(" | abandoned: {}", snapshot.entries_abandoned));
        }

        output
    }
}
