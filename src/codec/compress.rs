use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::CodecError;

/// Stable one-byte codes identifying the built-in compressors.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum CompressorId {
    Dummy = 0,
    Gzip = 1,
}

/// A named compression strategy applied to serialized body bytes.
pub trait Compressor: Send + Sync {
    fn id(&self) -> u8;
    fn name(&self) -> &'static str;

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Pass-through pseudo-compressor, equal to using no compression.
pub struct DummyCompressor;

impl Compressor for DummyCompressor {
    fn id(&self) -> u8 {
        CompressorId::Dummy.into()
    }

    fn name(&self) -> &'static str {
        "dummy"
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn id(&self) -> u8 {
        CompressorId::Gzip.into()
    }

    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trip() {
        let input = b"the same bytes over and over, the same bytes over and over".to_vec();
        let compressor = GzipCompressor;
        let packed = compressor.compress(&input).expect("compress failed");
        assert_ne!(packed, input);
        let unpacked = compressor.decompress(&packed).expect("decompress failed");
        assert_eq!(unpacked, input);
    }

    #[test]
    fn dummy_is_identity() {
        let input = b"untouched".to_vec();
        let compressor = DummyCompressor;
        assert_eq!(compressor.compress(&input).expect("compress failed"), input);
        assert_eq!(
            compressor.decompress(&input).expect("decompress failed"),
            input
        );
    }

    #[test]
    fn gzip_rejects_garbage() {
        let compressor = GzipCompressor;
        assert!(compressor.decompress(b"not a gzip stream").is_err());
    }
}
