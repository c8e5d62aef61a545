//! Simple-format decompression pump
//!
//! Parses the frame preamble, dispatches the magic number to a codec family,
//! then walks block headers one at a time: raw payloads are copied through,
//! RLE blocks are refilled from their stored byte, compressed payloads go
//! back through the codec adapter. Every regenerated byte is folded into the
//! running checksum, which must match the stored trailer.

use std::io::{Read, Write};
use tracing::{debug, trace};

use chute_keys::KeystreamSelector;

use crate::checksum::RunningChecksum;
use crate::codec::Codec;
use crate::frame::{self, BlockStart, BlockType, FRAME_HEADER_SIZE};
use crate::progress::Progress;
use crate::{Error, Result, Totals, read_fill};

/// Decompress one simple-format frame from `src` into `dst`.
///
/// `secret` must match the one used at encode time; block indices advance
/// once per block on both sides. A checksum mismatch, framing violation, or
/// codec failure is fatal to the whole operation.
pub fn decompress_stream<R: Read, W: Write>(
    secret: Option<&str>,
    src: &mut R,
    dst: &mut W,
) -> Result<Totals> {
    let (magic, block_size_id) = frame::read_frame_header(src)?;
    let codec = Codec::from_magic(magic).ok_or(Error::UnknownMagic(magic))?;
    let nominal = frame::block_size(block_size_id);

    let selector = KeystreamSelector::new(secret);
    let mut keystream = selector.cursor();
    let mut checksum = RunningChecksum::new();
    let mut progress = Progress::new();
    let mut totals = Totals {
        bytes_read: FRAME_HEADER_SIZE as u64,
        bytes_written: 0,
    };
    let mut payload = vec![0u8; nominal as usize];
    let mut regenerated = vec![0u8; nominal as usize];

    loop {
        let mut first = [0u8; 1];
        read_exact_or_truncated(src, &mut first, &mut totals.bytes_read)?;

        let header = match frame::read_block_header(first[0], src, nominal)? {
            BlockStart::Checksum => {
                let mut trailer = [0u8; 2];
                read_exact_or_truncated(src, &mut trailer, &mut totals.bytes_read)?;
                let stored = frame::read_checksum_trailer(first[0], &mut trailer.as_slice())?;
                let computed = checksum.truncated();
                if stored != computed {
                    return Err(Error::ChecksumMismatch { stored, computed });
                }
                break;
            }
            BlockStart::Data(header) => header,
        };
        totals.bytes_read += (header_size_on_wire(&header) - 1) as u64;

        let scrambler = keystream.next();
        trace!(?header, scrambler, "decoding block");

        let out: &[u8] = match header.block_type {
            BlockType::Raw => {
                let len = header.regenerated_size as usize;
                read_exact_or_truncated(src, &mut payload[..len], &mut totals.bytes_read)?;
                &payload[..len]
            }
            BlockType::Rle => {
                let mut stored = [0u8; 1];
                read_exact_or_truncated(src, &mut stored, &mut totals.bytes_read)?;
                let len = header.regenerated_size as usize;
                regenerated[..len].fill(stored[0]);
                &regenerated[..len]
            }
            BlockType::Compressed => {
                // Presence is guaranteed by the header codec for this type.
                let coded_len = header.compressed_size.unwrap_or(0) as usize;
                read_exact_or_truncated(src, &mut payload[..coded_len], &mut totals.bytes_read)?;
                let block = codec.decode_block(
                    &payload[..coded_len],
                    header.regenerated_size,
                    scrambler,
                )?;
                regenerated[..block.len()].copy_from_slice(&block);
                &regenerated[..block.len()]
            }
            BlockType::Checksum => unreachable!("handled as BlockStart::Checksum"),
        };

        checksum.update(out);
        dst.write_all(out)?;
        totals.bytes_written += out.len() as u64;
        progress.update(totals.bytes_read, totals.bytes_written);
    }

    dst.flush()?;
    debug!(
        codec = ?codec,
        bytes_read = totals.bytes_read,
        bytes_written = totals.bytes_written,
        blocks = keystream.blocks_seen(),
        "frame decompressed"
    );
    Ok(totals)
}

/// Wire length of a data block header (1, 3, or 5 bytes).
fn header_size_on_wire(header: &frame::BlockHeader) -> usize {
    let mut size = 1;
    if !header.full {
        size += 2;
    }
    if header.compressed_size.is_some() {
        size += 2;
    }
    size
}

/// `read_exact` that reports short input as a framing truncation rather than
/// a bare IO error, and accounts the bytes read.
fn read_exact_or_truncated<R: Read>(
    src: &mut R,
    buf: &mut [u8],
    counter: &mut u64,
) -> Result<()> {
    let got = read_fill(src, buf)?;
    *counter += got as u64;
    if got != buf.len() {
        return Err(Error::Truncated {
            expected: buf.len() as u64,
            actual: got as u64,
        });
    }
    Ok(())
}
