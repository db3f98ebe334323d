//! tscl Configuration
//!
//! TOML-based configuration loading with sensible defaults. Every section is
//! optional; a writer only needs its table name.
//!
//! # Parsing
//!
//! ```
//! use tscl_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[writer]\ntable = \"metrics\"").unwrap();
//! assert_eq!(config.writer.timestamp_column, "ts");
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [database]
//! user = "postgres"
//! password = "secret"
//! database = "telemetry"
//!
//! [writer]
//! table = "metrics"
//! utc_offset = "+02:00"
//! queue_capacity = 500
//!
//! [writer.timeout]
//! baseline = "5s"
//! floor = "500ms"
//! ```

mod database;
mod error;
mod logging;
mod metrics;
mod validation;
mod writer;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use database::{DEFAULT_HOST, DEFAULT_PORT, DatabaseConfig};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use writer::{OnFull, TimeoutConfig, WriterConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// Connection descriptor for the store
    pub database: DatabaseConfig,

    /// Destination table and writer knobs
    pub writer: WriterConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
