// src/recording/compressor.rs
//! gzip compression for batch bodies
//!
//! Bodies are sent with `Content-Encoding: gzip`; a failed compression falls
//! back to the raw body at the call site.

use crate::utils::errors::{Result, TrackerError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use std::io::{Read, Write};
use tracing::debug;

/// gzip magic bytes
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether `data` starts with a gzip header
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Compression levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Fast compression (level 1)
    Fast,

    /// Balanced (level 6)
    #[default]
    Balanced,

    /// Best compression (level 9)
    Best,
}

impl CompressionLevel {
    pub fn as_u32(&self) -> u32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 6,
            CompressionLevel::Best => 9,
        }
    }
}

/// Compression applied to request bodies before sending
pub trait BodyCompressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// gzip compressor
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor {
    level: CompressionLevel,
}

impl Compressor {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Compress data
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let level = self.level.as_u32();

        let mut encoder = GzEncoder::new(
            Vec::with_capacity(data.len() / 2),
            Compression::new(level),
        );
        encoder
            .write_all(data)
            .map_err(|e| TrackerError::CompressionFailed(format!("gzip write error: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| TrackerError::CompressionFailed(format!("gzip finish error: {}", e)))?;

        debug!(
            "Compressed {} bytes -> {} bytes at level {}",
            data.len(),
            compressed.len(),
            level
        );

        Ok(compressed)
    }

    /// Decompress data
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::with_capacity(data.len() * 4);
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| TrackerError::CompressionFailed(format!("gzip read error: {}", e)))?;

        debug!(
            "Decompressed {} bytes -> {} bytes",
            data.len(),
            decompressed.len()
        );

        Ok(decompressed)
    }
}

impl BodyCompressor for Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Compressor::compress(self, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_levels() {
        assert_eq!(CompressionLevel::Fast.as_u32(), 1);
        assert_eq!(CompressionLevel::Balanced.as_u32(), 6);
        assert_eq!(CompressionLevel::Best.as_u32(), 9);
    }

    #[test]
    fn test_compress_decompress() {
        let compressor = Compressor::new(CompressionLevel::Balanced);

        let data = b"tap tap swipe tap".repeat(100);

        let compressed = compressor.compress(&data).unwrap();
        assert!(is_gzip(&compressed));
        assert!(compressed.len() < data.len());

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_empty_input() {
        let compressor = Compressor::default();
        let compressed = compressor.compress(&[]).unwrap();
        assert!(compressor.decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_decompress_garbage_fails() {
        let compressor = Compressor::default();
        assert!(matches!(
            compressor.decompress(b"not gzip at all"),
            Err(TrackerError::CompressionFailed(_))
        ));
        assert!(!is_gzip(b"not gzip"));
    }
}
