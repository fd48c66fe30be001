// src/utils/time.rs
//! Wall-clock helpers

use chrono::Utc;

/// Milliseconds since the Unix epoch.
///
/// Clocks set before 1970 collapse to zero rather than wrapping.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
