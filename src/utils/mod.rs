// src/utils/mod.rs
//! Shared configuration, error types and clock helpers

pub mod config;
pub mod errors;
pub mod time;

pub use config::TrackerConfig;
pub use errors::{Result, TrackerError};
pub use time::now_ms;
