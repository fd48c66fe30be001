// src/codec/reader.rs
//! Decoding side of the wire codec
//!
//! A cursor over an immutable byte slice. Every read advances the cursor and
//! is bounds-checked; running off the end yields `TruncatedInput` and leaves
//! the cursor where it was.

use crate::codec::writer::MAX_VARINT_LEN;
use crate::utils::errors::{Result, TrackerError};

/// Cursor-based reader over encoded bytes
#[derive(Debug, Clone)]
pub struct MessageReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(TrackerError::TruncatedInput {
                needed: n,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(TrackerError::MalformedPayload(format!(
                "invalid boolean byte {:#04x}",
                other
            ))),
        }
    }

    /// Base-128 varint
    pub fn read_uint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value: u64 = 0;

        for i in 0..MAX_VARINT_LEN {
            let byte = match self.read_byte() {
                Ok(byte) => byte,
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            };
            let group = u64::from(byte & 0x7f);

            // The tenth byte may only contribute the top bit
            if i == MAX_VARINT_LEN - 1 && group > 1 {
                self.pos = start;
                return Err(TrackerError::MalformedPayload(
                    "varint overflows 64 bits".to_string(),
                ));
            }

            value |= group << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        self.pos = start;
        Err(TrackerError::MalformedPayload(
            "varint longer than 10 bytes".to_string(),
        ))
    }

    /// Fixed 8-byte big-endian unsigned integer
    pub fn read_fixed_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Fixed 4-byte big-endian float
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    /// Fixed 8-byte big-endian float
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// `varint(length) ++ bytes`
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let len = self.read_uint()?;
        let remaining = self.remaining();
        let len = match usize::try_from(len) {
            Ok(len) if len <= remaining => len,
            _ => {
                self.pos = start;
                return Err(TrackerError::TruncatedInput {
                    needed: usize::try_from(len).unwrap_or(usize::MAX),
                    remaining,
                });
            }
        };
        self.take(len)
    }

    /// `varint(utf8 length) ++ utf8 bytes`
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TrackerError::MalformedPayload(format!("invalid UTF-8: {}", e)))
    }

    /// A block written with the with-size wrapper
    pub fn read_sized(&mut self) -> Result<&'a [u8]> {
        self.read_bytes()
    }

    /// Everything after the cursor
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::writer::{encode_varint, MessageWriter};
    use bytes::BytesMut;
    use proptest::prelude::*;

    #[test]
    fn test_read_primitives() {
        let mut writer = MessageWriter::new();
        writer.put_u8(7);
        writer.put_bool(true);
        writer.put_uint(300);
        writer.put_fixed_u64(0x0102_0304_0506_0708);
        writer.put_f64(3.5);
        writer.put_str("tap");
        let bytes = writer.finish();

        let mut reader = MessageReader::new(&bytes);
        assert_eq!(reader.read_byte().unwrap(), 7);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_uint().unwrap(), 300);
        assert_eq!(reader.read_fixed_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(reader.read_f64().unwrap(), 3.5);
        assert_eq!(reader.read_string().unwrap(), "tap");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let mut reader = MessageReader::new(&[1, 2, 3]);
        assert_eq!(
            reader.read_fixed_u64(),
            Err(TrackerError::TruncatedInput {
                needed: 8,
                remaining: 3
            })
        );
        // Cursor untouched after a failed read
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_remaining(), &[1, 2, 3]);
    }

    #[test]
    fn test_corrupted_string_length_is_truncated() {
        // Claims 100 bytes, carries 3
        let bytes = [100u8, b'a', b'b', b'c'];
        let mut reader = MessageReader::new(&bytes);
        assert!(matches!(
            reader.read_string(),
            Err(TrackerError::TruncatedInput {
                needed: 100,
                remaining: 3
            })
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_unterminated_varint() {
        let mut reader = MessageReader::new(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_uint(),
            Err(TrackerError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_varint_overflow() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        let mut reader = MessageReader::new(&bytes);
        assert!(matches!(
            reader.read_uint(),
            Err(TrackerError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_invalid_bool() {
        let mut reader = MessageReader::new(&[2]);
        assert!(matches!(
            reader.read_bool(),
            Err(TrackerError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = MessageReader::new(&[2, 0xc3, 0x28]);
        assert!(matches!(
            reader.read_string(),
            Err(TrackerError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_boundary_varints() {
        for value in [0u64, 1, 127, 128, u32::MAX as u64, u64::MAX - 1, u64::MAX] {
            let mut buf = BytesMut::new();
            encode_varint(&mut buf, value);
            let mut reader = MessageReader::new(&buf);
            assert_eq!(reader.read_uint().unwrap(), value);
            assert!(reader.is_empty());
        }
    }

    proptest! {
        #[test]
        fn prop_varint_round_trip(value in any::<u64>()) {
            let mut buf = BytesMut::new();
            encode_varint(&mut buf, value);
            prop_assert_eq!(buf.len(), crate::codec::writer::varint_len(value));
            // Minimal: no trailing zero continuation group
            if buf.len() > 1 {
                prop_assert_ne!(buf[buf.len() - 1], 0);
            }
            let mut reader = MessageReader::new(&buf);
            prop_assert_eq!(reader.read_uint().unwrap(), value);
            prop_assert!(reader.is_empty());
        }

        #[test]
        fn prop_string_round_trip(value in ".*") {
            let mut writer = MessageWriter::new();
            writer.put_str(&value);
            let bytes = writer.finish();
            let mut reader = MessageReader::new(&bytes);
            prop_assert_eq!(reader.read_string().unwrap(), value);
        }
    }
}
