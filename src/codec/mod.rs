// src/codec/mod.rs
//! Compact binary wire codec
//!
//! Encoding rules:
//!
//! - **Unsigned integers**: base-128 varint, low groups first
//! - **Bytes / booleans**: one byte (`0` / `1` for booleans)
//! - **Strings**: `varint(utf8 length) ++ utf8 bytes`
//! - **Floats**: fixed-width big-endian (4 or 8 bytes)
//! - **With-size wrapper**: `varint(block length as u32) ++ block`
//!
//! Composite values are the concatenation of their fields in declaration
//! order. Length prefixes use the varint form on both sides of the wire.

pub mod reader;
pub mod writer;

pub use reader::MessageReader;
pub use writer::{encode_varint, varint_len, MessageWriter, MAX_VARINT_LEN};
