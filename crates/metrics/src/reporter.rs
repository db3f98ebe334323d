//! Per-writer metrics reporter
//!
//! Logs a writer's counters at a fixed interval until cancelled.

use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tscl_config::MetricsFormat;

use crate::format::MetricsFormatter;
use crate::{HumanFormatter, JsonFormatter, WriterMetricsProvider};

/// Periodic reporter for a single writer
pub struct WriterReporter {
    writer: Arc<dyn WriterMetricsProvider>,
    formatter: Box<dyn MetricsFormatter>,
    interval: Duration,
}

impl WriterReporter {
    pub fn new(
        writer: Arc<dyn WriterMetricsProvider>,
        format: MetricsFormat,
        interval: Duration,
    ) -> Self {
        let formatter: Box<dyn MetricsFormatter> = match format {
            MetricsFormat::Human => Box::new(HumanFormatter::new()),
            MetricsFormat::Json => Box::new(JsonFormatter::new()),
        };

        Self {
            writer,
            formatter,
            interval,
        }
    }

    /// Run the reporter until cancellation, with a final report on exit
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;

        info!(
            writer_id = self.writer.writer_id(),
            interval_secs = self.interval.as_secs(),
            "writer metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.report();
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Report current metrics, returning the formatted line
    fn report(&self) -> String {
        let snapshot = self.writer.snapshot();
        let output = self.formatter.format_writer(
            self.writer.writer_id(),
            &snapshot,
            self.interval.as_secs(),
        );

        info!("{}", output);
        output
    }
}
