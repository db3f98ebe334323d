//! Configuration validation
//!
//! Rejects settings the writer cannot run with. Nothing is silently coerced.

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::writer::{TimeoutConfig, WriterConfig};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_writer(&config.writer)?;
    validate_timeout(&config.writer.timeout)?;
    if config.metrics.enabled && config.metrics.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "metrics",
            "interval",
            "must be non-zero",
        ));
    }
    Ok(())
}

fn validate_writer(writer: &WriterConfig) -> Result<()> {
    if writer.table.trim().is_empty() {
        return Err(ConfigError::missing_field("writer", "table"));
    }
    if writer.timestamp_column.trim().is_empty() {
        return Err(ConfigError::missing_field("writer", "timestamp_column"));
    }
    if writer.offset().is_none() {
        return Err(ConfigError::invalid_value(
            "writer",
            "utc_offset",
            format!("'{}' is not an offset like +02:00", writer.utc_offset),
        ));
    }
    if writer.queue_capacity == 0 {
        return Err(ConfigError::invalid_value(
            "writer",
            "queue_capacity",
            "must be at least 1",
        ));
    }
    if writer.max_consecutive_failures == Some(0) {
        return Err(ConfigError::invalid_value(
            "writer",
            "max_consecutive_failures",
            "must be at least 1 when set",
        ));
    }
    Ok(())
}

fn validate_timeout(timeout: &TimeoutConfig) -> Result<()> {
    const SECTION: &str = "writer.timeout";

    if !(timeout.backoff_factor.is_finite() && timeout.backoff_factor > 1.0) {
        return Err(ConfigError::invalid_value(
            SECTION,
            "backoff_factor",
            format!("must be greater than 1, got {}", timeout.backoff_factor),
        ));
    }
    if !(timeout.recovery_factor.is_finite() && timeout.recovery_factor > 1.0) {
        return Err(ConfigError::invalid_value(
            SECTION,
            "recovery_factor",
            format!("must be greater than 1, got {}", timeout.recovery_factor),
        ));
    }
    if timeout.floor.is_zero() {
        return Err(ConfigError::invalid_value(SECTION, "floor", "must be non-zero"));
    }
    if timeout.floor > timeout.baseline {
        return Err(ConfigError::invalid_value(
            SECTION,
            "floor",
            format!(
                "{:?} exceeds baseline {:?}",
                timeout.floor, timeout.baseline
            ),
        ));
    }
    if timeout.recovery_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            SECTION,
            "recovery_interval",
            "must be non-zero",
        ));
    }
    Ok(())
}
