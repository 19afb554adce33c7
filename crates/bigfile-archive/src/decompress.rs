//! Entry decompression.

use crate::{ArchiveError, Result};
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Converts a compressed byte range into a buffer of known length.
///
/// The output slice is exactly the entry's uncompressed length. An
/// implementation must fill it completely and reject input that decodes to
/// more or fewer bytes.
pub trait Decompressor: Send + Sync {
    /// Decompress `input` into `output`.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<()>;
}

/// zlib decompressor backed by `flate2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibDecompressor;

impl Decompressor for ZlibDecompressor {
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<()> {
        let mut decoder = ZlibDecoder::new(input);
        decoder.read_exact(output).map_err(|e| {
            ArchiveError::Decompression(format!(
                "zlib stream shorter than {} bytes: {e}",
                output.len()
            ))
        })?;

        // Anything left over means the declared length is wrong
        let mut probe = [0u8; 1];
        match decoder.read(&mut probe) {
            Ok(0) => Ok(()),
            Ok(_) => Err(ArchiveError::Decompression(format!(
                "zlib stream longer than {} bytes",
                output.len()
            ))),
            Err(e) => Err(ArchiveError::Decompression(format!(
                "zlib stream trailer invalid: {e}"
            ))),
        }
    }
}

/// Compress data with zlib at the default level.
pub fn compress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(data, Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| ArchiveError::Decompression(format!("zlib compression failed: {e}")))?;
    Ok(compressed)
}
