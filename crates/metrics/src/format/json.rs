//! JSON formatter

use serde::Serialize;

use super::MetricsFormatter;
use crate::WriterMetricsSnapshot;

/// One JSON object per writer report
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct WriterReportJson<'a> {
    report_type: &'static str,
    writer_id: &'a str,
    period_secs: u64,
    #[serde(flatten)]
    snapshot: &'a WriterMetricsSnapshot,
}

impl MetricsFormatter for JsonFormatter {
    fn format_writer(
        &self,
        writer_id: &str,
        snapshot: &WriterMetricsSnapshot,
        interval_secs: u64,
    ) -> String {
        let json = WriterReportJson {
            report_type: "writer",
            writer_id,
            period_secs: interval_secs,
            snapshot,
        };
        serde_json::to_string(&json).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_writer_json() {
        let snapshot = WriterMetricsSnapshot {
            entries_written: 10,
            write_failures: 1,
            current_timeout_ms: 6666,
            ..Default::default()
        };

        let output = JsonFormatter::new().format_writer("metrics", &snapshot, 60);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["report_type"], "writer");
        assert_eq!(value["writer_id"], "metrics");
        assert_eq!(value["period_secs"], 60);
        assert_eq!(value["entries_written"], 10);
        assert_eq!(value["write_failures"], 1);
        assert_eq!(value["current_timeout_ms"], 6666);
    }
}
