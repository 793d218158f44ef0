//! Text bundle compression
//!
//! The encoder turns a per-language text map into a single compressed
//! blob. The JSON form of the map is the canonical uncompressed
//! representation; sizes and the compression ratio are measured against
//! it.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use uuid::Uuid;

use polyglot_common::{Error, Result};

/// A stored encoding of one task's aggregated translations.
#[derive(Debug, Clone)]
pub struct EncodedBundle {
    pub encoding_id: String,
    pub data: Vec<u8>,
    pub original_size: i64,
    pub compressed_size: i64,
    /// compressed / original, 0.0 for an empty input.
    pub compression_ratio: f64,
}

pub trait TextEncoder: Send + Sync {
    /// Compress a language -> aggregated-text map into a bundle with a
    /// fresh encoding id.
    fn encode(&self, texts: &BTreeMap<String, String>) -> Result<EncodedBundle>;

    /// Recover the language map from a bundle's data.
    fn decode(&self, data: &[u8]) -> Result<BTreeMap<String, String>>;
}

/// Deflate-backed encoder (zlib framing).
pub struct DeflateEncoder {
    level: Compression,
}

impl DeflateEncoder {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for DeflateEncoder {
    fn default() -> Self {
        Self::new(Compression::default().level())
    }
}

impl TextEncoder for DeflateEncoder {
    fn encode(&self, texts: &BTreeMap<String, String>) -> Result<EncodedBundle> {
        let original = serde_json::to_vec(texts)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(&original)?;
        let data = encoder.finish()?;

        let original_size = original.len() as i64;
        let compressed_size = data.len() as i64;
        let compression_ratio = if original_size > 0 {
            compressed_size as f64 / original_size as f64
        } else {
            0.0
        };

        Ok(EncodedBundle {
            encoding_id: Uuid::new_v4().simple().to_string(),
            data,
            original_size,
            compressed_size,
            compression_ratio,
        })
    }

    fn decode(&self, data: &[u8]) -> Result<BTreeMap<String, String>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut original = Vec::new();
        decoder
            .read_to_end(&mut original)
            .map_err(|e| Error::InvalidInput(format!("corrupt encoded bundle: {e}")))?;
        Ok(serde_json::from_slice(&original)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<String, String> {
        let mut texts = BTreeMap::new();
        texts.insert("en".to_string(), "hello world\n\nhello again".repeat(20));
        texts.insert("ja".to_string(), "こんにちは世界".repeat(20));
        texts
    }

    #[test]
    fn encode_then_decode_recovers_the_map() {
        let encoder = DeflateEncoder::default();
        let bundle = encoder.encode(&sample()).unwrap();

        assert_eq!(bundle.encoding_id.len(), 32);
        assert_eq!(bundle.compressed_size, bundle.data.len() as i64);
        assert!(bundle.compressed_size < bundle.original_size);
        assert!(bundle.compression_ratio > 0.0 && bundle.compression_ratio < 1.0);

        assert_eq!(encoder.decode(&bundle.data).unwrap(), sample());
    }

    #[test]
    fn garbage_data_fails_to_decode() {
        let encoder = DeflateEncoder::default();
        assert!(encoder.decode(b"not a zlib stream").is_err());
    }

    #[test]
    fn level_is_clamped() {
        let encoder = DeflateEncoder::new(100);
        assert!(encoder.encode(&sample()).is_ok());
    }
}
