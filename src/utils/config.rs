// src/utils/config.rs
//! Tracker configuration
//!
//! Loaded from an optional `replay-tracker.{toml,json,yaml}` file, then
//! overridden by `REPLAY__<SECTION>__<KEY>` environment variables. Every field
//! has a default so an empty environment yields a working configuration.

use crate::conditions::ConditionRule;
use crate::recording::compressor::CompressionLevel;
use crate::recording::recorder::RecordingMode;
use crate::utils::errors::{Result, TrackerError};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration file stem
pub const DEFAULT_CONFIG_FILE: &str = "replay-tracker";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "REPLAY";

/// Top-level tracker configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub delivery: DeliverySettings,
    pub buffer: BufferSettings,
    pub cycling: CyclingSettings,
    pub storage: StorageSettings,
    pub recording: RecordingSettings,
    pub conditions: Vec<ConditionRule>,
}

/// Delivery scheduler settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Ingestion endpoint receiving batch bodies
    pub ingest_url: String,

    /// Project key sent as a bearer token
    pub project_key: Option<String>,

    /// Tick interval (milliseconds)
    pub flush_interval_ms: u64,

    /// Upper bound on a single batch (bytes, before compression)
    pub batch_max_bytes: usize,

    /// Per-request timeout (milliseconds)
    pub send_timeout_ms: u64,

    /// gzip level
    pub compression_level: CompressionLevel,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            ingest_url: "http://127.0.0.1:9000/v1/mobile/i".to_string(),
            project_key: None,
            flush_interval_ms: 5_000,
            batch_max_bytes: 1_000_000,
            send_timeout_ms: 15_000,
            compression_level: CompressionLevel::Balanced,
        }
    }
}

impl DeliverySettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Message buffer limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Largest single encoded record accepted
    pub max_message_bytes: usize,

    /// Most pending bytes a buffer holds; appends past it are rejected
    pub capacity_bytes: usize,

    /// Fraction of capacity that triggers an eager flush
    pub pressure_ratio: f64,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            max_message_bytes: 500_000,
            capacity_bytes: 5_000_000,
            pressure_ratio: 0.8,
        }
    }
}

impl BufferSettings {
    /// Pending size above which producers request an eager flush
    pub fn pressure_threshold(&self) -> usize {
        (self.capacity_bytes as f64 * self.pressure_ratio) as usize
    }
}

/// Dual-buffer cycling settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CyclingSettings {
    /// Interval between alternating clears (milliseconds)
    pub cycle_interval_ms: u64,
}

impl Default for CyclingSettings {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 30_000,
        }
    }
}

impl CyclingSettings {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

/// Late-message storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the late-message file
    pub base_dir: PathBuf,

    /// Late-message file name
    pub file_name: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("replay-tracker"),
            file_name: "late-messages.bin".to_string(),
        }
    }
}

/// Recording mode settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub mode: RecordingMode,
}

impl TrackerConfig {
    /// Load from the default file stem and environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file stem (extension optional) and environment
    pub fn load_from(path: &str) -> Result<Self> {
        let config: TrackerConfig = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.delivery.ingest_url.is_empty() {
            return Err(TrackerError::Configuration(
                "delivery.ingest_url must not be empty".to_string(),
            ));
        }
        if self.delivery.flush_interval_ms == 0 {
            return Err(TrackerError::Configuration(
                "delivery.flush_interval_ms must be positive".to_string(),
            ));
        }
        if self.delivery.batch_max_bytes == 0 {
            return Err(TrackerError::Configuration(
                "delivery.batch_max_bytes must be positive".to_string(),
            ));
        }
        if self.cycling.cycle_interval_ms == 0 {
            return Err(TrackerError::Configuration(
                "cycling.cycle_interval_ms must be positive".to_string(),
            ));
        }
        if !(self.buffer.pressure_ratio > 0.0 && self.buffer.pressure_ratio <= 1.0) {
            return Err(TrackerError::Configuration(format!(
                "buffer.pressure_ratio must be in (0, 1], got {}",
                self.buffer.pressure_ratio
            )));
        }
        if self.buffer.max_message_bytes > self.buffer.capacity_bytes {
            return Err(TrackerError::Configuration(format!(
                "buffer.max_message_bytes ({}) exceeds buffer.capacity_bytes ({})",
                self.buffer.max_message_bytes, self.buffer.capacity_bytes
            )));
        }
        Ok(())
    }
}
