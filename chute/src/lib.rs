//! Chute — self-describing block-stream container
//!
//! Chute wraps interchangeable block compressors behind one file format: the
//! input stream is split into bounded blocks, each block is compressed with
//! the selected codec family, framed with a compact header recording how it
//! was encoded, and the stream is terminated with an integrity checksum.
//!
//! Two frame formats share the crate:
//!
//! - the *simple* format ([`compress`]/[`decompress`]): fixed-size blocks,
//!   per-block raw/rle/compressed selection, 22-bit stream checksum;
//! - the *buffered* format ([`buffered`]): resumable chunked zstd streaming
//!   with optional preset dictionaries and multi-frame concatenation.
//!
//! Path-based entry points, batch processing, and the destination-overwrite
//! policy live in [`fileio`].

pub mod buffered;
pub mod checksum;
pub mod codec;
pub mod compress;
pub mod decompress;
pub mod error;
pub mod fileio;
pub mod frame;
mod progress;

pub use chute_keys::KeystreamSelector;
pub use codec::{Codec, EncodeOutcome};
pub use compress::{CompressOptions, compress_stream};
pub use decompress::decompress_stream;
pub use error::{Error, Result};

use std::io::Read;

/// Byte counters reported by every pump, for caller-side diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Bytes consumed from the source.
    pub bytes_read: u64,
    /// Bytes produced into the destination.
    pub bytes_written: u64,
}

/// Read until `buf` is full or the source is exhausted; returns the byte
/// count actually read. Smooths over short reads so block sizing only
/// depends on the source length.
pub(crate) fn read_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
