// src/messages/stream.rs
//! Decoding concatenated records and whole batch bodies
//!
//! Each record's payload is size-prefixed, so an unknown or damaged record is
//! skipped without losing the stream position. Only a damaged header or size
//! prefix ends the stream.

use crate::codec::MessageReader;
use crate::messages::record::{EventKind, EventRecord, RawFrame};
use crate::recording::compressor::{is_gzip, Compressor};
use crate::utils::errors::{Result, TrackerError};
use tracing::debug;

/// Iterator yielding one result per record in a byte stream
pub struct RecordStream<'a> {
    reader: MessageReader<'a>,
    done: bool,
}

impl<'a> RecordStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: MessageReader::new(bytes),
            done: false,
        }
    }

    /// Offset of the next unread record
    pub fn position(&self) -> usize {
        self.reader.position()
    }
}

impl<'a> Iterator for RecordStream<'a> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.is_empty() {
            return None;
        }

        match RawFrame::read(&mut self.reader) {
            Ok(frame) => Some(frame.decode()),
            Err(e) => {
                // Header damage: no way to find the next record
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode every record in `bytes`
pub fn decode_stream(bytes: &[u8]) -> Vec<Result<EventRecord>> {
    RecordStream::new(bytes).collect()
}

/// A batch body split back into its parts
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBatch {
    /// Sequence number of the first record after the batch marker
    pub first_index: u64,

    /// Records that decoded cleanly, in wire order
    pub records: Vec<EventRecord>,

    /// Per-record failures, in wire order
    pub errors: Vec<TrackerError>,
}

/// Decode a request body produced by the delivery scheduler.
///
/// gzip bodies are detected by their magic bytes and inflated first. The
/// body must open with a batch marker.
pub fn decode_batch(body: &[u8]) -> Result<DecodedBatch> {
    let inflated;
    let raw = if is_gzip(body) {
        inflated = Compressor::default().decompress(body)?;
        &inflated[..]
    } else {
        body
    };

    let mut stream = RecordStream::new(raw);
    let first_index = match stream.next() {
        Some(Ok(EventRecord {
            kind: EventKind::BatchMeta { first_index },
            ..
        })) => first_index,
        Some(Ok(other)) => {
            return Err(TrackerError::MalformedPayload(format!(
                "batch opens with {} instead of a batch marker",
                other.type_tag()
            )))
        }
        Some(Err(e)) => return Err(e),
        None => {
            return Err(TrackerError::MalformedPayload(
                "empty batch body".to_string(),
            ))
        }
    };

    let mut records = Vec::new();
    let mut errors = Vec::new();
    for result in stream {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!("Skipping undecodable record: {}", e);
                errors.push(e);
            }
        }
    }

    Ok(DecodedBatch {
        first_index,
        records,
        errors,
    })
}
