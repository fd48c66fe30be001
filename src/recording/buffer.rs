// src/recording/buffer.rs
//! Ordered buffer of encoded records awaiting delivery
//!
//! Producers on any thread append; the delivery scheduler drains size-bounded
//! prefixes and puts them back at the head when a send fails. All mutation of
//! the pending list and its byte counter happens under one lock.

use crate::messages::{EventKind, EventRecord, SerializedMessage};
use crate::utils::config::BufferSettings;
use crate::utils::errors::{Result, TrackerError};
use crate::utils::time::now_ms;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct BufferState {
    pending: VecDeque<SerializedMessage>,
    pending_bytes: usize,
    /// Messages handed to delivery so far; the next batch's first index
    drained: u64,
}

/// Result of a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Pending size after the append
    pub pending_bytes: usize,

    /// Pending size crossed the eager-flush threshold
    pub under_pressure: bool,
}

/// Thread-safe FIFO of serialized records
pub struct MessageBuffer {
    settings: BufferSettings,
    state: Mutex<BufferState>,
    appended: AtomicU64,
    dropped: AtomicU64,
}

impl MessageBuffer {
    pub fn new(settings: BufferSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(BufferState::default()),
            appended: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &BufferSettings {
        &self.settings
    }

    /// Encode and append a record
    pub fn append(&self, record: &EventRecord) -> Result<AppendReceipt> {
        let message = record.encode()?;
        self.append_encoded(message)
    }

    /// Append an already-encoded record.
    ///
    /// Oversized records, and records that would take pending size past
    /// `capacity_bytes`, are rejected whole; the pending list is untouched.
    pub fn append_encoded(&self, message: SerializedMessage) -> Result<AppendReceipt> {
        let size = message.len();
        if size > self.settings.max_message_bytes {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(TrackerError::OversizedMessage {
                size,
                limit: self.settings.max_message_bytes,
            });
        }

        let pending_bytes = {
            let mut state = self.state.lock();
            if state.pending_bytes + size > self.settings.capacity_bytes {
                let pending = state.pending_bytes;
                drop(state);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(TrackerError::BufferFull {
                    size,
                    pending,
                    capacity: self.settings.capacity_bytes,
                });
            }
            state.pending.push_back(message);
            state.pending_bytes += size;
            state.pending_bytes
        };
        self.appended.fetch_add(1, Ordering::Relaxed);

        Ok(AppendReceipt {
            pending_bytes,
            under_pressure: pending_bytes > self.settings.pressure_threshold(),
        })
    }

    /// Remove the longest prefix whose total size fits in `max_bytes`.
    ///
    /// A head record larger than `max_bytes` is returned alone so delivery
    /// can never stall behind it. Returns `None` when nothing is pending.
    pub fn drain(&self, max_bytes: usize) -> Option<Batch> {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            return None;
        }

        let mut count = 0;
        let mut byte_len = 0usize;
        for message in state.pending.iter() {
            let next = byte_len.saturating_add(message.len());
            if count > 0 && next > max_bytes {
                break;
            }
            byte_len = next;
            count += 1;
            if byte_len >= max_bytes {
                break;
            }
        }

        let messages: Vec<_> = state.pending.drain(..count).collect();
        state.pending_bytes -= byte_len;
        let first_index = state.drained;
        state.drained += count as u64;

        debug!(
            "Drained {} messages ({} bytes) starting at index {}",
            count, byte_len, first_index
        );

        Some(Batch {
            first_index,
            drained_at: now_ms(),
            messages,
            byte_len,
        })
    }

    /// Drain everything pending into one batch
    pub fn drain_all(&self) -> Option<Batch> {
        self.drain(usize::MAX)
    }

    /// Put a drained batch back at the head, in its original order.
    ///
    /// When the batch is the most recent drain its sequence numbers are
    /// released, so the retry carries the same indices.
    pub fn requeue_front(&self, batch: Batch) {
        let mut state = self.state.lock();
        let end = batch.first_index + batch.messages.len() as u64;
        if end == state.drained {
            state.drained = batch.first_index;
        } else {
            warn!(
                "Requeued batch [{}, {}) is not the latest drain (next index {})",
                batch.first_index, end, state.drained
            );
        }

        state.pending_bytes += batch.byte_len;
        for message in batch.messages.into_iter().rev() {
            state.pending.push_front(message);
        }
    }

    /// Drop every pending message, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.pending.len();
        state.pending.clear();
        state.pending_bytes = 0;
        count
    }

    /// Move every pending message out without touching sequence numbers
    pub(crate) fn take_all(&self) -> Vec<SerializedMessage> {
        let mut state = self.state.lock();
        state.pending_bytes = 0;
        state.pending.drain(..).collect()
    }

    /// Replace the pending list wholesale
    pub(crate) fn replace_pending(&self, messages: Vec<SerializedMessage>) {
        let mut state = self.state.lock();
        state.pending_bytes = messages.iter().map(SerializedMessage::len).sum();
        state.pending = messages.into();
    }

    /// Forget pending messages and restart sequence numbers at zero
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = BufferState::default();
    }

    pub fn pending_bytes(&self) -> usize {
        self.state.lock().pending_bytes
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    /// Whether pending size is past the eager-flush threshold
    pub fn under_pressure(&self) -> bool {
        self.pending_bytes() > self.settings.pressure_threshold()
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.state.lock();
        BufferStats {
            pending_messages: state.pending.len(),
            pending_bytes: state.pending_bytes,
            drained_messages: state.drained,
            appended_messages: self.appended.load(Ordering::Relaxed),
            dropped_messages: self.dropped.load(Ordering::Relaxed),
            capacity_bytes: self.settings.capacity_bytes,
        }
    }
}

/// Ordered group of messages drained together
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    first_index: u64,
    drained_at: u64,
    messages: Vec<SerializedMessage>,
    byte_len: usize,
}

impl Batch {
    /// Sequence number of the first message
    pub fn first_index(&self) -> u64 {
        self.first_index
    }

    pub fn messages(&self) -> &[SerializedMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total size of the messages, without the batch marker
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Request body: batch marker followed by every message
    pub fn encode(&self) -> Result<Bytes> {
        let marker = EventRecord::at(
            self.drained_at,
            EventKind::BatchMeta {
                first_index: self.first_index,
            },
        )
        .encode()?;

        let mut body = BytesMut::with_capacity(marker.len() + self.byte_len);
        body.extend_from_slice(marker.as_bytes());
        for message in &self.messages {
            body.extend_from_slice(message.as_bytes());
        }
        Ok(body.freeze())
    }
}

/// Buffer statistics
#[derive(Debug, Clone, Default)]
pub struct BufferStats {
    pub pending_messages: usize,
    pub pending_bytes: usize,
    pub drained_messages: u64,
    pub appended_messages: u64,
    pub dropped_messages: u64,
    pub capacity_bytes: usize,
}

impl BufferStats {
    /// Calculate fill percentage
    pub fn fill_percentage(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            (self.pending_bytes as f64 / self.capacity_bytes as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MessageWriter;
    use crate::messages::decode_batch;
    use std::sync::Arc;

    /// A message of exactly `size` bytes
    fn sized_message(size: usize) -> SerializedMessage {
        // tag + ts(1) + size prefix(<=3) + payload
        let prefix = if size - 3 < 128 {
            1
        } else if size - 4 < 16_384 {
            2
        } else {
            3
        };
        let payload_len = size - 2 - prefix;
        let mut payload = MessageWriter::new();
        payload.put_raw(&vec![b'x'; payload_len]);
        let mut out = MessageWriter::new();
        out.put_u8(104);
        out.put_uint(1);
        out.put_sized(payload.as_slice()).unwrap();
        let bytes = out.finish();
        assert_eq!(bytes.len(), size);
        SerializedMessage::from_bytes_unchecked(bytes)
    }

    fn settings() -> BufferSettings {
        BufferSettings {
            max_message_bytes: 500_000,
            capacity_bytes: 1_000,
            pressure_ratio: 0.8,
        }
    }

    fn log(content: &str) -> EventRecord {
        EventRecord::at(
            1,
            EventKind::Log {
                severity: "info".into(),
                content: content.into(),
            },
        )
    }

    #[test]
    fn test_drain_respects_max_bytes() {
        let buffer = MessageBuffer::new(settings());
        let a = sized_message(100);
        let b = sized_message(200);
        buffer.append_encoded(a.clone()).unwrap();
        buffer.append_encoded(b.clone()).unwrap();

        let batch = buffer.drain(250).unwrap();
        assert_eq!(batch.messages(), &[a]);
        assert_eq!(batch.byte_len(), 100);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.pending_bytes(), 200);

        let batch = buffer.drain(250).unwrap();
        assert_eq!(batch.messages(), &[b]);
        assert_eq!(batch.first_index(), 1);
        assert!(buffer.drain(250).is_none());
    }

    #[test]
    fn test_oversized_head_is_returned_alone() {
        let buffer = MessageBuffer::new(settings());
        buffer.append_encoded(sized_message(300)).unwrap();
        buffer.append_encoded(sized_message(10)).unwrap();

        let batch = buffer.drain(250).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.byte_len(), 300);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_oversized_message_is_rejected() {
        let buffer = MessageBuffer::new(settings());
        buffer.append(&log("keep")).unwrap();
        let before = buffer.pending_bytes();

        let result = buffer.append_encoded(sized_message(600_000));
        assert_eq!(
            result,
            Err(TrackerError::OversizedMessage {
                size: 600_000,
                limit: 500_000
            })
        );
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.pending_bytes(), before);
        assert_eq!(buffer.stats().dropped_messages, 1);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let buffer = MessageBuffer::new(settings());
        buffer.append_encoded(sized_message(600)).unwrap();
        buffer.append_encoded(sized_message(400)).unwrap();

        let result = buffer.append_encoded(sized_message(10));
        assert_eq!(
            result,
            Err(TrackerError::BufferFull {
                size: 10,
                pending: 1_000,
                capacity: 1_000
            })
        );
        assert_eq!(buffer.pending_bytes(), 1_000);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.stats().dropped_messages, 1);

        // Draining makes room again
        buffer.drain(600).unwrap();
        buffer.append_encoded(sized_message(10)).unwrap();
        assert_eq!(buffer.pending_bytes(), 410);
    }

    #[test]
    fn test_requeue_restores_order_and_indices() {
        let buffer = MessageBuffer::new(settings());
        for i in 0..5 {
            buffer.append(&log(&format!("m{}", i))).unwrap();
        }

        let first = buffer.drain(usize::MAX).unwrap();
        assert_eq!(first.first_index(), 0);
        buffer.append(&log("late")).unwrap();

        let expected = first.messages().to_vec();
        buffer.requeue_front(first);
        assert_eq!(buffer.len(), 6);

        let retry = buffer.drain(usize::MAX).unwrap();
        assert_eq!(retry.first_index(), 0);
        assert_eq!(&retry.messages()[..5], &expected[..]);
        assert_eq!(retry.len(), 6);
        assert_eq!(buffer.stats().drained_messages, 6);
    }

    #[test]
    fn test_first_index_is_contiguous() {
        let buffer = MessageBuffer::new(settings());
        let mut expected_index = 0;
        for round in 0..4 {
            for i in 0..(round + 1) {
                buffer.append(&log(&format!("{}-{}", round, i))).unwrap();
            }
            let batch = buffer.drain_all().unwrap();
            assert_eq!(batch.first_index(), expected_index);
            expected_index += batch.len() as u64;
        }
    }

    #[test]
    fn test_pressure_flag() {
        let buffer = MessageBuffer::new(settings());
        let receipt = buffer.append_encoded(sized_message(700)).unwrap();
        assert!(!receipt.under_pressure);
        let receipt = buffer.append_encoded(sized_message(150)).unwrap();
        assert!(receipt.under_pressure);
        assert_eq!(receipt.pending_bytes, 850);
        assert!(buffer.under_pressure());
    }

    #[test]
    fn test_batch_encoding_starts_with_marker() {
        let buffer = MessageBuffer::new(settings());
        let records = vec![log("a"), log("b")];
        for r in &records {
            buffer.append(r).unwrap();
        }
        let body = buffer.drain_all().unwrap().encode().unwrap();
        let decoded = decode_batch(&body).unwrap();
        assert_eq!(decoded.first_index, 0);
        assert_eq!(decoded.records, records);
    }

    #[test]
    fn test_reset_restarts_indices() {
        let buffer = MessageBuffer::new(settings());
        buffer.append(&log("a")).unwrap();
        buffer.drain_all().unwrap();
        buffer.append(&log("b")).unwrap();
        buffer.reset();
        assert!(buffer.is_empty());
        buffer.append(&log("c")).unwrap();
        assert_eq!(buffer.drain_all().unwrap().first_index(), 0);
    }

    #[test]
    fn test_concurrent_appends_keep_every_message() {
        let buffer = Arc::new(MessageBuffer::new(BufferSettings::default()));
        let mut handles = vec![];

        for t in 0..8 {
            let b = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                for i in 0..250 {
                    b.append(&log(&format!("{}-{}", t, i))).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = buffer.stats();
        assert_eq!(stats.pending_messages, 2_000);
        assert_eq!(stats.appended_messages, 2_000);

        let batch = buffer.drain_all().unwrap();
        let total: usize = batch.messages().iter().map(|m| m.len()).sum();
        assert_eq!(total, stats.pending_bytes);
    }

    #[test]
    fn test_ordering_across_failed_sends() {
        let buffer = MessageBuffer::new(settings());
        let records: Vec<_> = (0..20).map(|i| log(&format!("r{}", i))).collect();
        let mut delivered = Vec::new();

        for (i, record) in records.iter().enumerate() {
            buffer.append(record).unwrap();
            if i % 3 == 2 {
                let batch = buffer.drain(60).unwrap();
                if i % 2 == 0 {
                    // Send failed
                    buffer.requeue_front(batch);
                } else {
                    assert_eq!(batch.first_index(), delivered.len() as u64);
                    delivered.extend(batch.messages().to_vec());
                }
            }
        }
        while let Some(batch) = buffer.drain(60) {
            assert_eq!(batch.first_index(), delivered.len() as u64);
            delivered.extend(batch.messages().to_vec());
        }

        let expected: Vec<_> = records.iter().map(|r| r.encode().unwrap()).collect();
        assert_eq!(delivered, expected);
    }
}
