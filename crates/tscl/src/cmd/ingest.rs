//! Ingest command - Stream JSON-lines entries into the configured table
//!
//! Each input line is one entry:
//!
//! ```json
//! {"ts": "2024-04-23T14:21:45+02:00", "fields": {"service": "Kontext", "requests": 42}}
//! ```
//!
//! `ts` is optional and defaults to the time the line was read. Integral
//! numbers become integers, other numbers floats. Nested values are rejected.
//!
//! # Usage
//!
//! ```bash
//! tscl ingest < metrics.jsonl
//! tscl ingest --input metrics.jsonl
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use clap::Args;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tscl_config::{Config, OnFull, WriterConfig};
use tscl_metrics::WriterReporter;
use tscl_writer::postgres::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CONNECTIONS, PgExecutor};
use tscl_writer::{
    Entry, EntrySender, FailureReceiver, OverflowPolicy, TableWriter, TimeoutSettings, Value,
    WriterError, WriterOptions,
};

/// How long the writer may keep working through queued entries after input
/// ends; whatever is left afterwards is abandoned and reported
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Ingest command arguments
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Read entries from this file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,
}

/// Counts for the end-of-run summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct IngestStats {
    lines: u64,
    sent: u64,
    rejected: u64,
}

/// What the failure consumer saw before the queue closed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FailureTally {
    failed: u64,
    abandoned: usize,
}

/// Run the ingest command
pub async fn run(config: Config, args: IngestArgs) -> Result<()> {
    let offset = config
        .writer
        .offset()
        .with_context(|| format!("invalid utc_offset '{}'", config.writer.utc_offset))?;

    let db = &config.database;
    info!(database = %db.redacted(), table = %config.writer.table, "connecting");
    let executor = PgExecutor::connect_with(
        &db.connection_string(),
        db.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
        DEFAULT_CONNECT_TIMEOUT,
    )
    .await
    .context("failed to connect to database")?;

    let writer = TableWriter::new(
        Arc::new(executor),
        &config.writer.table,
        &config.writer.timestamp_column,
        offset,
    );

    let cancel = CancellationToken::new();
    let (entries, failures) = writer
        .activate(cancel.clone(), writer_options(&config.writer))
        .context("failed to start writer")?;

    let reporter = config.metrics.enabled.then(|| {
        let reporter = WriterReporter::new(
            Arc::new(writer.metrics_handle()),
            config.metrics.format,
            config.metrics.interval,
        );
        tokio::spawn(reporter.run(cancel.child_token()))
    });

    let failure_task = tokio::spawn(log_failures(failures));

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut stats = IngestStats::default();
    let outcome = tokio::select! {
        result = feed(&writer, &entries, reader, &mut stats) => result,
        _ = wait_for_shutdown() => {
            info!("shutdown signal received, abandoning queued entries");
            cancel.cancel();
            Ok(())
        }
    };

    // Closing the entry queue lets the writer drain whatever is left
    drop(entries);

    let tally = wait_for_writer(failure_task, &cancel, DRAIN_TIMEOUT).await;

    cancel.cancel();
    if let Some(reporter) = reporter
        && let Err(e) = reporter.await
    {
        warn!(error = %e, "metrics reporter panicked");
    }

    info!(
        lines = stats.lines,
        sent = stats.sent,
        rejected = stats.rejected,
        failed = tally.failed,
        abandoned = tally.abandoned,
        "ingest complete"
    );
    outcome
}

/// Wait for the failure queue to close.
///
/// If the writer is still busy after `drain_timeout`, cancel it and keep
/// waiting so its abandoned-entries report is still logged.
async fn wait_for_writer(
    mut failure_task: JoinHandle<FailureTally>,
    cancel: &CancellationToken,
    drain_timeout: Duration,
) -> FailureTally {
    let joined = match tokio::time::timeout(drain_timeout, &mut failure_task).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(
                timeout_secs = drain_timeout.as_secs(),
                "writer still busy, abandoning queued entries"
            );
            cancel.cancel();
            failure_task.await
        }
    };

    joined.unwrap_or_else(|e| {
        warn!(error = %e, "failure consumer panicked");
        FailureTally::default()
    })
}

/// Map the writer section of the config onto activation options
fn writer_options(config: &WriterConfig) -> WriterOptions {
    let timeout = TimeoutSettings::default()
        .with_baseline(config.timeout.baseline)
        .with_floor(config.timeout.floor)
        .with_backoff_factor(config.timeout.backoff_factor)
        .with_recovery_factor(config.timeout.recovery_factor)
        .with_recovery_interval(config.timeout.recovery_interval);

    let on_full = match config.on_full {
        OnFull::Drop => OverflowPolicy::Drop,
        OnFull::Block => OverflowPolicy::Block,
    };

    let mut options = WriterOptions::default()
        .with_timeout_settings(timeout)
        .with_queue_capacity(config.queue_capacity)
        .with_overflow_policy(on_full);
    if let Some(n) = config.max_consecutive_failures {
        options = options.with_max_consecutive_failures(n);
    }
    options
}

/// Read lines until EOF, sending each valid entry with backpressure
async fn feed(
    writer: &TableWriter,
    entries: &EntrySender,
    reader: impl AsyncBufRead + Unpin,
    stats: &mut IngestStats,
) -> Result<()> {
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        stats.lines += 1;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = match ParsedLine::parse(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(line = stats.lines, error = %e, "skipping invalid line");
                stats.rejected += 1;
                continue;
            }
        };

        let entry = parsed.into_entry(writer);
        if entries.send(entry).await.is_err() {
            warn!(line = stats.lines, "writer stopped, no more entries accepted");
            break;
        }
        stats.sent += 1;
    }

    debug!(lines = stats.lines, "end of input");
    Ok(())
}

/// Log every failure until the writer closes the queue
async fn log_failures(mut failures: FailureReceiver) -> FailureTally {
    let mut tally = FailureTally::default();
    while let Some(failure) = failures.recv().await {
        match (&failure.entry, &failure.error) {
            (Some(entry), error) => {
                tally.failed += 1;
                warn!(error = %error, entry = %entry, "write failed");
            }
            (None, error) => {
                if let WriterError::Abandoned { count } = error {
                    tally.abandoned += count;
                }
                error!(error = %error, "writer stopped");
            }
        }
    }
    tally
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// =============================================================================
// Input lines
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default)]
    ts: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

/// One decoded input line
#[derive(Debug, PartialEq)]
struct ParsedLine {
    ts: Option<DateTime<FixedOffset>>,
    fields: Vec<(String, Value)>,
}

impl ParsedLine {
    fn parse(line: &str) -> Result<Self> {
        let raw: RawLine = serde_json::from_str(line).context("invalid JSON")?;

        let fields = raw
            .fields
            .into_iter()
            .map(|(name, value)| {
                let value = json_to_value(&value)
                    .with_context(|| format!("unsupported value for field '{name}'"))?;
                Ok((name, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { ts: raw.ts, fields })
    }

    fn into_entry(self, writer: &TableWriter) -> Entry {
        let entry = match self.ts {
            Some(ts) => writer.new_entry(ts),
            None => writer.new_entry(Utc::now()),
        };
        self.fields
            .into_iter()
            .fold(entry, |entry, (name, value)| entry.set(name, value))
    }
}

fn json_to_value(value: &serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;

    match value {
        Json::String(s) => Ok(Value::Text(s.clone())),
        Json::Bool(b) => Ok(Value::Boolean(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .context("number out of range"),
        },
        Json::Null => anyhow::bail!("null"),
        Json::Array(_) => anyhow::bail!("array"),
        Json::Object(_) => anyhow::bail!("object"),
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod ingest_test;
