// src/messages/mod.rs
//! Event record model
//!
//! - **Tag**: stable numeric identifiers for each record type
//! - **Record**: the closed `EventKind` sum type, encoding and decoding
//! - **Stream**: decoding concatenated records and batch bodies

pub mod record;
pub mod stream;
pub mod tag;

pub use record::{EventKind, EventRecord, RawFrame, SerializedMessage};
pub use stream::{decode_batch, decode_stream, DecodedBatch, RecordStream};
pub use tag::TypeTag;
