// src/recording/mod.rs
//! Event recording and delivery
//!
//! - **Buffer**: ordered queue of encoded records with byte accounting
//! - **Cycler**: alternating buffer pair for buffered (cold-start) recording
//! - **Scheduler**: timer and pressure driven drain, compress, send loop
//! - **Compressor**: gzip batch bodies
//! - **Sender**: pluggable transport, HTTP by default
//! - **Storage**: one late-message file for batches that missed shutdown
//! - **Recorder**: per-session context object tying the above together
//!
//! # Architecture
//!
//! ```text
//! record() → MessageBuffer ──(interval / pressure)──→ DeliveryScheduler
//!    │            ↑                                          ↓
//!    │      requeue_front on failure              drain ≤ batch_max_bytes
//!    │                                                       ↓
//!    └→ BufferCycler (buffered mode only)             gzip (raw fallback)
//!                                                            ↓
//!                                                     Sender::send
//!                                                            ↓
//!                                       shutdown failure → PendingStore
//! ```

pub mod buffer;
pub mod compressor;
pub mod cycler;
pub mod recorder;
pub mod scheduler;
pub mod sender;
pub mod storage;

pub use buffer::{AppendReceipt, Batch, BufferStats, MessageBuffer};
pub use compressor::{BodyCompressor, CompressionLevel, Compressor};
pub use cycler::{BufferCycler, BufferSide};
pub use recorder::{RecordingMode, SessionRecorder};
pub use scheduler::{DeliveryScheduler, DeliveryState, DeliveryStats, TickOutcome};
pub use sender::{HttpSender, Sender};
pub use storage::{FilePendingStore, PendingStore};
