//! Pipeline configuration
//!
//! Defaults match the production feed: 10 write workers, batches of 20
//! ticks, a 500 ms flush interval and exchange time at UTC+08:00.
//!
//! Environment variables (see `IngestConfig::from_env`):
//! - `TICK_INGEST_WORKERS`
//! - `TICK_INGEST_BATCH_SIZE`
//! - `TICK_INGEST_FLUSH_INTERVAL_MS`
//! - `TICK_INGEST_UTC_OFFSET_SECS`
//! - `TICK_INGEST_FAILURE_SAMPLE`
//! - `TICK_INFLUX_*` for the storage target

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use tick_store::{InfluxOptions, TargetError};
use tick_types::time::{utc_offset, DEFAULT_UTC_OFFSET_SECS};

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 500;
pub const DEFAULT_FAILURE_SAMPLE: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("UTC offset of {0}s is not within (-86400, 86400)")]
    UtcOffset(i32),

    #[error("storage target: {0}")]
    Target(#[from] TargetError),
}

/// Configuration of one ingestion pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of concurrent write workers.
    pub workers: usize,
    /// Maximum ticks per batch.
    pub batch_size: usize,
    /// Maximum age of a non-empty buffer before it is flushed.
    pub flush_interval_ms: u64,
    /// Offset of the feed's exchange-local time from UTC.
    pub utc_offset_secs: i32,
    /// Instrument ids listed per failed batch in fault logs.
    pub failure_sample: usize,
    pub storage: InfluxOptions,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
            failure_sample: DEFAULT_FAILURE_SAMPLE,
            storage: InfluxOptions::default(),
        }
    }
}

impl IngestConfig {
    /// Load from the environment; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            workers: env_or("TICK_INGEST_WORKERS", defaults.workers)?,
            batch_size: env_or("TICK_INGEST_BATCH_SIZE", defaults.batch_size)?,
            flush_interval_ms: env_or("TICK_INGEST_FLUSH_INTERVAL_MS", defaults.flush_interval_ms)?,
            utc_offset_secs: env_or("TICK_INGEST_UTC_OFFSET_SECS", defaults.utc_offset_secs)?,
            failure_sample: env_or("TICK_INGEST_FAILURE_SAMPLE", defaults.failure_sample)?,
            storage: InfluxOptions::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("batch_size"));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Zero("flush_interval_ms"));
        }
        if utc_offset(self.utc_offset_secs).is_none() {
            return Err(ConfigError::UtcOffset(self.utc_offset_secs));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }
}

fn env_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.flush_interval(), Duration::from_millis(500));
        assert_eq!(config.utc_offset_secs, 8 * 3600);
        assert_eq!(config.storage.measurement, "ctp");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = IngestConfig::default().with_workers(0);
        assert!(matches!(config.validate(), Err(ConfigError::Zero("workers"))));

        let config = IngestConfig::default().with_batch_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::Zero("batch_size"))));

        let config = IngestConfig::default().with_flush_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero("flush_interval_ms"))
        ));
    }

    #[test]
    fn test_out_of_range_utc_offset_rejected() {
        let mut config = IngestConfig::default();
        config.utc_offset_secs = 86_400;
        assert!(matches!(config.validate(), Err(ConfigError::UtcOffset(86_400))));

        config.utc_offset_secs = -5 * 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: IngestConfig = serde_json::from_str(
            r#"{"workers": 4, "storage": {"uri": "influxdb://localhost/ticks"}}"#,
        )
        .unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.storage.measurement, "ctp");
        assert_eq!(config.storage.resolve().unwrap().database(), "ticks");
    }

    #[test]
    fn test_env_override() {
        // Only this test touches these variables.
        env::set_var("TICK_INGEST_BATCH_SIZE", "7");
        assert_eq!(env_or("TICK_INGEST_BATCH_SIZE", 20usize).unwrap(), 7);

        env::set_var("TICK_INGEST_BATCH_SIZE", "seven");
        assert!(matches!(
            env_or("TICK_INGEST_BATCH_SIZE", 20usize),
            Err(ConfigError::InvalidValue { var: "TICK_INGEST_BATCH_SIZE", .. })
        ));
        env::remove_var("TICK_INGEST_BATCH_SIZE");
        assert_eq!(env_or("TICK_INGEST_BATCH_SIZE", 20usize).unwrap(), 20);
    }
}
