// src/utils/errors.rs
//! Error taxonomy for the tracker
//!
//! Nothing in the encoding or delivery path is allowed to take the host
//! process down. Every failure surfaces as one of these values and the caller
//! decides whether to log, drop or retry.

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Error types for the tracker
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    /// A single record is larger than the buffer accepts
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    OversizedMessage { size: usize, limit: usize },

    /// Appending would push the buffer past its capacity
    #[error("Buffer full: {pending} of {capacity} bytes pending, {size} byte message rejected")]
    BufferFull {
        size: usize,
        pending: usize,
        capacity: usize,
    },

    /// A read ran past the end of its buffer
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput { needed: usize, remaining: usize },

    /// The record header carried a tag outside the known set
    #[error("Unknown record type: {0}")]
    UnknownRecordType(u8),

    /// The payload did not match the layout of its record type
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Transport failure or non-2xx response
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// gzip encoding or decoding failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// Late-message persistence failed
    #[error("Storage failed: {0}")]
    StorageFailed(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The recorder was started twice
    #[error("Recorder is already running")]
    AlreadyRunning,
}

impl TrackerError {
    /// Whether the error only invalidates the record being decoded.
    ///
    /// Record-local errors happen inside a size-prefixed payload, so a stream
    /// decoder can skip the record and keep going.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            TrackerError::TruncatedInput { .. }
                | TrackerError::UnknownRecordType(_)
                | TrackerError::MalformedPayload(_)
        )
    }
}

impl From<config::ConfigError> for TrackerError {
    fn from(e: config::ConfigError) -> Self {
        TrackerError::Configuration(e.to_string())
    }
}
