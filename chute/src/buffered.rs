//! Buffered streaming pump with dictionary support
//!
//! The buffered format delegates the frame body to zstd's resumable
//! streaming contexts. This layer owns the staging buffers (allocated once
//! at the codec-recommended sizes and reused across every file of a run),
//! primes each frame with the optional preset dictionary, and drives the
//! init / continue / end lifecycle. On decode it also handles files made of
//! several frames concatenated back-to-back.

use std::io::{Read, Write};
use tracing::{debug, trace};

use chute_keys::KeystreamSelector;
use zstd::stream::raw::{Decoder, Encoder, InBuffer, Operation, OutBuffer};
use zstd::zstd_safe::{CCtx, DCtx};

use crate::progress::Progress;
use crate::{Error, Result, Totals, read_fill};

/// Little-endian magic number opening every zstd frame.
pub const BUFFERED_MAGIC: u32 = 0xFD2F_B528;

/// Default compression level for the buffered format.
pub const DEFAULT_LEVEL: i32 = 3;

/// Reusable encode-side context: staging buffers, dictionary, level.
///
/// One session serves a whole multi-file run; only the zstd context is
/// re-initialized per file, which re-primes the dictionary.
pub struct CompressSession {
    level: i32,
    dictionary: Vec<u8>,
    selector: KeystreamSelector,
    src_buf: Vec<u8>,
    dst_buf: Vec<u8>,
}

impl CompressSession {
    /// Create a session. `dictionary` may be empty for dictionary-less runs.
    pub fn new(level: i32, dictionary: Vec<u8>, secret: Option<&str>) -> Self {
        Self {
            level,
            dictionary,
            selector: KeystreamSelector::new(secret),
            src_buf: vec![0u8; CCtx::in_size()],
            dst_buf: vec![0u8; CCtx::out_size()],
        }
    }

    /// Compress `src` into one frame written to `dst`.
    ///
    /// Each staged input chunk must be fully consumed by the codec in one
    /// call; anything less is an internal-consistency failure.
    pub fn compress<R: Read, W: Write>(&mut self, src: &mut R, dst: &mut W) -> Result<Totals> {
        let mut encoder = Encoder::with_dictionary(self.level, &self.dictionary)?;
        let mut keystream = self.selector.cursor();
        let mut progress = Progress::new();
        let mut totals = Totals::default();

        loop {
            let staged = read_fill(src, &mut self.src_buf)?;
            if staged == 0 {
                break;
            }
            totals.bytes_read += staged as u64;

            // Advisory per-chunk tag; the frame body is owned by the codec.
            let scrambler = keystream.next();
            trace!(staged, scrambler, "staging chunk");

            let mut input = InBuffer::around(&self.src_buf[..staged]);
            let mut output = OutBuffer::around(&mut self.dst_buf[..]);
            encoder.run(&mut input, &mut output)?;
            if input.pos != staged {
                // Staged chunks match the recommended input size, so the
                // codec is expected to drain them in one call.
                return Err(Error::InputNotConsumed {
                    fed: staged,
                    consumed: input.pos,
                });
            }
            dst.write_all(output.as_slice())?;
            totals.bytes_written += output.as_slice().len() as u64;
            progress.update(totals.bytes_read, totals.bytes_written);
        }

        // End of frame: flush trailing codec state until none remains.
        loop {
            let mut output = OutBuffer::around(&mut self.dst_buf[..]);
            let remaining = encoder.finish(&mut output, true)?;
            dst.write_all(output.as_slice())?;
            totals.bytes_written += output.as_slice().len() as u64;
            if remaining == 0 {
                break;
            }
        }
        dst.flush()?;

        debug!(
            bytes_read = totals.bytes_read,
            bytes_written = totals.bytes_written,
            dictionary = !self.dictionary.is_empty(),
            "buffered frame compressed"
        );
        Ok(totals)
    }
}

/// Reusable decode-side context; counterpart of [`CompressSession`].
pub struct DecompressSession {
    dictionary: Vec<u8>,
    selector: KeystreamSelector,
    src_buf: Vec<u8>,
    dst_buf: Vec<u8>,
}

impl DecompressSession {
    pub fn new(dictionary: Vec<u8>, secret: Option<&str>) -> Self {
        Self {
            dictionary,
            selector: KeystreamSelector::new(secret),
            src_buf: vec![0u8; DCtx::in_size()],
            dst_buf: vec![0u8; DCtx::out_size()],
        }
    }

    /// Decompress every concatenated frame in `src` into `dst`.
    ///
    /// Frames are detected by re-reading a 4-byte magic number after the
    /// previous frame's end; end-of-file with zero bytes read stops cleanly.
    pub fn decompress<R: Read, W: Write>(&mut self, src: &mut R, dst: &mut W) -> Result<Totals> {
        let mut totals = Totals::default();
        let mut frames = 0u32;

        loop {
            let got = read_fill(src, &mut self.src_buf[..4])?;
            if got == 0 {
                break;
            }
            if got != 4 {
                return Err(Error::Truncated {
                    expected: 4,
                    actual: got as u64,
                });
            }
            totals.bytes_read += 4;

            let magic = u32::from_le_bytes([
                self.src_buf[0],
                self.src_buf[1],
                self.src_buf[2],
                self.src_buf[3],
            ]);
            if magic != BUFFERED_MAGIC {
                return Err(Error::UnknownMagic(magic));
            }

            self.decompress_frame(src, dst, &mut totals)?;
            frames += 1;
        }

        dst.flush()?;
        debug!(
            frames,
            bytes_read = totals.bytes_read,
            bytes_written = totals.bytes_written,
            "buffered stream decompressed"
        );
        Ok(totals)
    }

    /// Decode one frame whose 4 magic bytes are already staged in `src_buf`.
    fn decompress_frame<R: Read, W: Write>(
        &mut self,
        src: &mut R,
        dst: &mut W,
        totals: &mut Totals,
    ) -> Result<()> {
        let mut decoder = Decoder::with_dictionary(&self.dictionary)?;
        let mut keystream = self.selector.cursor();
        let mut progress = Progress::new();
        let mut staged = 4usize;

        loop {
            let scrambler = keystream.next();
            trace!(staged, scrambler, "decoding chunk");

            let mut input = InBuffer::around(&self.src_buf[..staged]);
            let mut output = OutBuffer::around(&mut self.dst_buf[..]);
            let hint = decoder.run(&mut input, &mut output)?;

            dst.write_all(output.as_slice())?;
            totals.bytes_written += output.as_slice().len() as u64;
            progress.update(totals.bytes_read, totals.bytes_written);

            if hint == 0 {
                // Frame complete; any unconsumed staged bytes would belong
                // to the next frame, which the chunk sizing never produces.
                break;
            }
            if input.pos != staged {
                return Err(Error::InputNotConsumed {
                    fed: staged,
                    consumed: input.pos,
                });
            }
            if hint > self.src_buf.len() {
                return Err(Error::ChunkRequestTooLarge {
                    requested: hint,
                    capacity: self.src_buf.len(),
                });
            }

            let got = read_fill(src, &mut self.src_buf[..hint])?;
            if got != hint {
                return Err(Error::Truncated {
                    expected: hint as u64,
                    actual: got as u64,
                });
            }
            totals.bytes_read += got as u64;
            staged = got;
        }
        Ok(())
    }
}
