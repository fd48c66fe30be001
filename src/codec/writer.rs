// src/codec/writer.rs
//! Encoding side of the wire codec

use crate::utils::errors::{Result, TrackerError};
use bytes::{BufMut, Bytes, BytesMut};

/// Longest possible varint encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` as a base-128 varint, low groups first.
pub fn encode_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `encode_varint` emits for `value`
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Growable output buffer with one method per wire type
#[derive(Debug, Default)]
pub struct MessageWriter {
    buf: BytesMut,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Single raw byte
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Boolean as one byte, `0` or `1`
    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Unsigned integer as a varint
    pub fn put_uint(&mut self, value: u64) {
        encode_varint(&mut self.buf, value);
    }

    /// Fixed 8-byte big-endian unsigned integer
    pub fn put_fixed_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    /// Fixed 4-byte big-endian float
    pub fn put_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    /// Fixed 8-byte big-endian float
    pub fn put_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    /// `varint(utf8 length) ++ utf8 bytes`
    pub fn put_str(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
    }

    /// `varint(length) ++ bytes`
    pub fn put_bytes(&mut self, value: &[u8]) {
        encode_varint(&mut self.buf, value.len() as u64);
        self.buf.put_slice(value);
    }

    /// Already-encoded bytes, copied without framing
    pub fn put_raw(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    /// Already-encoded block prefixed with its length as a 32-bit varint.
    ///
    /// This is what makes a record payload skippable by readers that do not
    /// understand the record type.
    pub fn put_sized(&mut self, block: &[u8]) -> Result<()> {
        let len = u32::try_from(block.len()).map_err(|_| TrackerError::OversizedMessage {
            size: block.len(),
            limit: u32::MAX as usize,
        })?;
        encode_varint(&mut self.buf, u64::from(len));
        self.buf.put_slice(block);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Freeze into an immutable, cheaply clonable buffer
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varint(value: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, value);
        buf.to_vec()
    }

    #[test]
    fn test_varint_known_values() {
        assert_eq!(varint(0), vec![0x00]);
        assert_eq!(varint(1), vec![0x01]);
        assert_eq!(varint(127), vec![0x7f]);
        assert_eq!(varint(128), vec![0x80, 0x01]);
        assert_eq!(varint(300), vec![0xac, 0x02]);
        assert_eq!(varint(16_384), vec![0x80, 0x80, 0x01]);
        assert_eq!(varint(u64::MAX).len(), MAX_VARINT_LEN);
        assert_eq!(*varint(u64::MAX).last().unwrap(), 0x01);
    }

    #[test]
    fn test_varint_len_matches_encoding() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            assert_eq!(varint_len(value), varint(value).len(), "value {}", value);
        }
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut writer = MessageWriter::new();
        writer.put_str("héllo");
        // 'é' is two bytes in UTF-8
        assert_eq!(writer.as_slice()[0], 6);
        assert_eq!(&writer.as_slice()[1..], "héllo".as_bytes());
    }

    #[test]
    fn test_bool_and_floats() {
        let mut writer = MessageWriter::new();
        writer.put_bool(true);
        writer.put_bool(false);
        writer.put_f32(1.5);
        writer.put_f64(-2.25);
        let bytes = writer.finish();
        assert_eq!(bytes.len(), 2 + 4 + 8);
        assert_eq!(&bytes[..2], &[1, 0]);
        assert_eq!(&bytes[2..6], &1.5f32.to_be_bytes());
        assert_eq!(&bytes[6..], &(-2.25f64).to_be_bytes());
    }

    #[test]
    fn test_put_sized_prefixes_length() {
        let mut writer = MessageWriter::new();
        writer.put_sized(&[0xaa; 200]).unwrap();
        assert_eq!(&writer.as_slice()[..2], &[0xc8, 0x01]);
        assert_eq!(writer.len(), 202);
    }
}
