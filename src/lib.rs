// src/lib.rs
//! Replay Tracker Library
//!
//! Session-replay recording core for mobile SDKs: a compact binary record
//! format, a bounded message buffer, a delivery scheduler, and dual-buffer
//! cycling for sessions that only upload when something goes wrong.
//!
//! # Architecture
//!
//! - **codec**: varint / fixed-width primitives over byte buffers
//! - **messages**: typed event records and their wire framing
//! - **recording**: buffering, cycling, delivery and late-message storage
//! - **conditions**: triggers that end buffered recording
//! - **observability**: tracing and metrics setup
//! - **utils**: configuration, errors, time

pub mod codec;
pub mod conditions;
pub mod messages;
pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use conditions::{Condition, ConditionEvaluator, ConditionRule, ConditionSet};
pub use messages::{decode_batch, decode_stream, EventKind, EventRecord, TypeTag};
pub use recording::{MessageBuffer, RecordingMode, SessionRecorder};
pub use utils::config::TrackerConfig;
pub use utils::errors::{Result, TrackerError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}
