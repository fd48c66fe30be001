// src/observability/mod.rs
//! Logging and metrics setup
//!
//! The library only emits `tracing` events and `metrics` counters. Binaries
//! decide where they go by calling [`init_tracing`] and [`init_metrics`].

use metrics::describe_counter;
use tracing_subscriber::EnvFilter;

/// Counter names
pub mod names {
    pub const BATCHES_SENT: &str = "replay_batches_sent_total";
    pub const BATCHES_FAILED: &str = "replay_batches_failed_total";
    pub const MESSAGES_SENT: &str = "replay_messages_sent_total";
    pub const MESSAGES_DROPPED: &str = "replay_messages_dropped_total";
    pub const COMPRESSION_FALLBACKS: &str = "replay_compression_fallbacks_total";
    pub const LATE_DELIVERED: &str = "replay_late_batches_delivered_total";
    pub const LATE_PERSISTED: &str = "replay_late_batches_persisted_total";
}

const DEFAULT_FILTER: &str = "replay_tracker=info";

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; set `REPLAY_LOG_FORMAT=json` for JSON lines.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("REPLAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

/// Describe every counter the crate emits
pub fn init_metrics() -> anyhow::Result<()> {
    describe_counter!(names::BATCHES_SENT, "Batches accepted by the ingest endpoint");
    describe_counter!(names::BATCHES_FAILED, "Batch sends that failed and were requeued");
    describe_counter!(names::MESSAGES_SENT, "Records delivered inside accepted batches");
    describe_counter!(
        names::MESSAGES_DROPPED,
        "Records rejected on append or dropped as unencodable"
    );
    describe_counter!(
        names::COMPRESSION_FALLBACKS,
        "Batches sent uncompressed after gzip failed"
    );
    describe_counter!(
        names::LATE_DELIVERED,
        "Persisted late-message files delivered on start or flush"
    );
    describe_counter!(
        names::LATE_PERSISTED,
        "Final flushes that failed and were written to disk"
    );
    Ok(())
}
