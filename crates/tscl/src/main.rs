//! tscl - Stream metrics into a time-series table
//!
//! # Usage
//!
//! ```bash
//! # Write JSON-lines entries from stdin
//! tscl --config tscl.toml ingest < metrics.jsonl
//!
//! # Or from a file
//! tscl ingest --input metrics.jsonl
//!
//! # Show the effective configuration
//! tscl config
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tscl_config::{Config, LogConfig, LogFormat, LogOutput};

/// Default config locations, tried in order when --config is not given
const DEFAULT_CONFIG_PATHS: &[&str] = &["tscl.toml", "configs/tscl.toml"];

/// tscl - Stream metrics into a time-series table
#[derive(Parser, Debug)]
#[command(name = "tscl")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true, env = "TSCL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read JSON-lines entries and write them to the configured table
    Ingest(cmd::ingest::IngestArgs),

    /// Validate and print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Ingest(args) => {
            let config = load_config(cli.config.as_deref())?;
            init_logging(&config.log, cli.log_level.as_deref())?;
            cmd::ingest::run(config, args).await
        }
        Command::Config => {
            // Config only prints to stdout, no logging needed
            let config = load_config(cli.config.as_deref())?;
            cmd::config::run(&config)
        }
    }
}

/// Load the config from an explicit path, a default location, or defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let candidate = Path::new(candidate);
        if candidate.exists() {
            return Config::from_file(candidate).with_context(|| {
                format!("failed to load configuration from {}", candidate.display())
            });
        }
    }

    anyhow::bail!(
        "no config file found (tried {}); pass --config",
        DEFAULT_CONFIG_PATHS.join(", ")
    )
}

/// Initialize the tracing subscriber. CLI level > config level.
fn init_logging(log: &LogConfig, cli_level: Option<&str>) -> Result<()> {
    let level = cli_level.unwrap_or(log.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let writer = || match log.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    let (console, json) = match log.format {
        LogFormat::Console => (
            Some(fmt::layer().with_target(true).with_writer(writer())),
            None,
        ),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(writer()))),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(json)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    Ok(())
}
