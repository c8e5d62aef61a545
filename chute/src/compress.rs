//! Simple-format compression pump
//!
//! Drives fixed-size block reads through the codec adapter and serializes
//! each block with the header encoding its outcome: compressed payloads get
//! a compressed-size field, incompressible blocks are stored raw, and
//! single-byte runs collapse to one stored byte. The frame ends with the
//! 22-bit checksum of all original payload bytes.

use std::io::{Read, Write};
use tracing::debug;

use chute_keys::KeystreamSelector;

use crate::checksum::RunningChecksum;
use crate::codec::{Codec, EncodeOutcome};
use crate::frame::{
    self, BlockHeader, CHECKSUM_TRAILER_SIZE, DEFAULT_BLOCK_SIZE_ID, FRAME_HEADER_SIZE,
};
use crate::progress::Progress;
use crate::{Result, Totals, read_fill};

/// Encode-side configuration for the simple frame format.
///
/// Passed explicitly into the pump; there is no process-wide state.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Codec family recorded in the frame magic.
    pub codec: Codec,
    /// Block-size exponent, 0..=6 (`2^n` KiB blocks).
    pub block_size_id: u8,
    /// Optional secret feeding the per-block keystream selector.
    pub secret: Option<String>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            block_size_id: DEFAULT_BLOCK_SIZE_ID,
            secret: None,
        }
    }
}

/// Compress `src` into one simple-format frame written to `dst`.
///
/// Returns the byte totals on both sides. The destination is flushed but not
/// closed; the caller owns both handles.
pub fn compress_stream<R: Read, W: Write>(
    options: &CompressOptions,
    src: &mut R,
    dst: &mut W,
) -> Result<Totals> {
    let nominal = frame::block_size(options.block_size_id);
    let selector = KeystreamSelector::new(options.secret.as_deref());
    let mut keystream = selector.cursor();
    let mut checksum = RunningChecksum::new();
    let mut progress = Progress::new();
    let mut totals = Totals::default();
    let mut block = vec![0u8; nominal as usize];

    frame::write_frame_header(dst, options.codec.magic(), options.block_size_id)?;
    totals.bytes_written += FRAME_HEADER_SIZE as u64;

    loop {
        let read = read_fill(src, &mut block)?;
        if read == 0 {
            break;
        }
        let payload = &block[..read];
        totals.bytes_read += read as u64;
        checksum.update(payload);

        let scrambler = keystream.next();
        let written = match options.codec.encode_block(payload, scrambler)? {
            EncodeOutcome::Incompressible => {
                let header = BlockHeader::raw(read as u32, nominal).write_to(dst)?;
                dst.write_all(payload)?;
                header + read
            }
            EncodeOutcome::RunLength(byte) => {
                let header = BlockHeader::rle(read as u32, nominal).write_to(dst)?;
                dst.write_all(&[byte])?;
                header + 1
            }
            EncodeOutcome::Compressed(coded) => {
                let header = BlockHeader::compressed(read as u32, coded.len() as u32, nominal)
                    .write_to(dst)?;
                dst.write_all(&coded)?;
                header + coded.len()
            }
        };
        totals.bytes_written += written as u64;
        progress.update(totals.bytes_read, totals.bytes_written);
    }

    frame::write_checksum_trailer(dst, checksum.truncated())?;
    totals.bytes_written += CHECKSUM_TRAILER_SIZE as u64;
    dst.flush()?;

    debug!(
        codec = ?options.codec,
        bytes_read = totals.bytes_read,
        bytes_written = totals.bytes_written,
        blocks = keystream.blocks_seen(),
        "frame compressed"
    );
    Ok(totals)
}
