//! Raw-deflate codec for HWP streams. The FileHeader flag word decides
//! whether a stream is compressed at all; a flagged stream that fails to
//! inflate is corrupt, not a candidate for guesswork.

use crate::error::{HwpError, Result};
use flate2::bufread::DeflateEncoder;
use flate2::read::DeflateDecoder;
use flate2::Compression;
use std::io::Read;

/// Inflate a raw-deflate stream (HWP carries no zlib header). Zero-length
/// streams stay zero-length; empty attachments exist in real files.
pub fn decompress_stream(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::with_capacity(data.len().saturating_mul(3));
    decoder
        .read_to_end(&mut out)
        .map_err(|e| HwpError::Corrupt(format!("Stream is not valid raw deflate: {}", e)))?;
    Ok(out)
}

/// Deflate a stream with the default window, headerless.
pub fn compress_stream(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(data, Compression::default());
    let mut out = Vec::with_capacity(data.len() / 2 + 64);
    encoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let original = b"hwp section stream payload \xec\x95\x88\xeb\x85\x95".to_vec();
        let packed = compress_stream(&original).unwrap();
        let unpacked = decompress_stream(&packed).unwrap();
        assert_eq!(original, unpacked);
    }

    #[test]
    fn empty_stream() {
        assert!(decompress_stream(&[]).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = decompress_stream(b"\xff\xff definitely not deflate").unwrap_err();
        assert!(matches!(err, HwpError::Corrupt(_)));
    }
}
