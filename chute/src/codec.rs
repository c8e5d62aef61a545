//! Block codec adapters
//!
//! The simple frame format treats its compressors as interchangeable black
//! boxes behind one call contract: encode one block, report either the coded
//! bytes or a distinguished outcome (incompressible, single repeated byte),
//! and decode one block back to a declared regenerated size. Each family is
//! identified on the wire by its own magic number.
//!
//! The per-block scrambler value from `chute-keys` is applied here, and only
//! here, as a symmetric XOR mask over the coded payload. A zero value is the
//! identity. Raw and RLE payloads bypass the codec and are never masked.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use tracing::trace;

use crate::{Error, Result};

/// Magic number for the zstd block-codec family.
pub const MAGIC_ZSTD: u32 = 0x1E7A_B309;
/// Magic number for the DEFLATE block-codec family.
pub const MAGIC_DEFLATE: u32 = 0x1E7A_B409;
/// Magic number for the LZ4 block-codec family.
pub const MAGIC_LZ4: u32 = 0x1E7A_B509;

const ZSTD_BLOCK_LEVEL: i32 = 3;

/// Closed set of block compressors for the simple frame format.
///
/// Adding a family means adding a variant here; every dispatch site matches
/// on the variant rather than consulting its own magic-number table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Zstandard block compression.
    #[default]
    Zstd,
    /// Raw DEFLATE block compression.
    Deflate,
    /// LZ4 block compression.
    Lz4,
}

/// Result of attempting to compress one block.
///
/// Replaces the original contract's reserved sentinel sizes (0 and 1) with
/// explicit variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// Compression did not shrink the block; store it verbatim.
    Incompressible,
    /// The whole block is one repeated byte; store that byte.
    RunLength(u8),
    /// Coded payload, strictly smaller than the input.
    Compressed(Vec<u8>),
}

impl Codec {
    /// Resolve a frame magic number to its codec family.
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            MAGIC_ZSTD => Some(Self::Zstd),
            MAGIC_DEFLATE => Some(Self::Deflate),
            MAGIC_LZ4 => Some(Self::Lz4),
            _ => None,
        }
    }

    /// Magic number identifying this family on the wire.
    pub const fn magic(self) -> u32 {
        match self {
            Self::Zstd => MAGIC_ZSTD,
            Self::Deflate => MAGIC_DEFLATE,
            Self::Lz4 => MAGIC_LZ4,
        }
    }

    /// Compress one block of original payload.
    pub fn encode_block(self, src: &[u8], scrambler: u32) -> Result<EncodeOutcome> {
        if let [first, rest @ ..] = src {
            if rest.iter().all(|b| b == first) {
                trace!(len = src.len(), "block is a single repeated byte");
                return Ok(EncodeOutcome::RunLength(*first));
            }
        }

        let mut coded = match self {
            Self::Zstd => zstd::bulk::compress(src, ZSTD_BLOCK_LEVEL)
                .map_err(|e| Error::Codec(format!("zstd block compression failed: {e}")))?,
            Self::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(src)
                    .and_then(|()| encoder.finish())
                    .map_err(|e| Error::Codec(format!("deflate compression failed: {e}")))?
            }
            Self::Lz4 => lz4_flex::compress(src),
        };

        if coded.len() >= src.len() {
            trace!(
                src = src.len(),
                coded = coded.len(),
                "block is incompressible"
            );
            return Ok(EncodeOutcome::Incompressible);
        }

        apply_mask(&mut coded, scrambler);
        Ok(EncodeOutcome::Compressed(coded))
    }

    /// Decompress one coded payload back to exactly `regenerated_size` bytes.
    pub fn decode_block(self, payload: &[u8], regenerated_size: u32, scrambler: u32) -> Result<Vec<u8>> {
        let expected = regenerated_size as usize;
        let mut coded = payload.to_vec();
        apply_mask(&mut coded, scrambler);

        let regenerated = match self {
            Self::Zstd => zstd::bulk::decompress(&coded, expected)
                .map_err(|e| Error::Codec(format!("zstd block decompression failed: {e}")))?,
            Self::Deflate => {
                let mut decoder = DeflateDecoder::new(coded.as_slice());
                let mut out = Vec::with_capacity(expected);
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| Error::Codec(format!("deflate decompression failed: {e}")))?;
                out
            }
            Self::Lz4 => lz4_flex::decompress(&coded, expected)
                .map_err(|e| Error::Codec(format!("lz4 decompression failed: {e}")))?,
        };

        if regenerated.len() != expected {
            return Err(Error::Codec(format!(
                "block regenerated to {} bytes, header declared {expected}",
                regenerated.len()
            )));
        }
        Ok(regenerated)
    }
}

/// Symmetric XOR mask over a coded payload: the scrambler's four
/// little-endian bytes, cycled. Zero is the identity.
fn apply_mask(data: &mut [u8], scrambler: u32) {
    if scrambler == 0 {
        return;
    }
    let mask = scrambler.to_le_bytes();
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % mask.len()];
    }
}
