//! Frame and block header wire codec
//!
//! A chute frame is laid out as:
//!
//! ```text
//! MAGIC (4 bytes, little-endian)  - selects the codec family
//! DESCRIPTOR (1 byte)             - block-size exponent, 0..=6 (2^n KiB)
//! ( BLOCK HEADER - BLOCK PAYLOAD )*
//! CHECKSUM TRAILER (3 bytes)      - type tag + 22-bit stream hash
//! ```
//!
//! Block headers are 1, 3, or 5 bytes. Byte 0 carries the block type in bits
//! 7-6 and the full-size flag in bit 5. Non-full blocks follow with a 16-bit
//! big-endian regenerated size (0 conventionally denotes the nominal maximum
//! block size); compressed blocks follow with a 16-bit big-endian compressed
//! size.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{Error, Result};

/// Magic plus descriptor byte.
pub const FRAME_HEADER_SIZE: usize = 5;
/// Largest block header: type byte + regenerated size + compressed size.
pub const MAX_BLOCK_HEADER_SIZE: usize = 5;
/// Largest supported block-size exponent (6 => 64 KiB blocks).
pub const MAX_BLOCK_SIZE_ID: u8 = 6;
/// Default block-size exponent (5 => 32 KiB blocks).
pub const DEFAULT_BLOCK_SIZE_ID: u8 = 5;

/// Checksum trailer length, including its embedded type tag.
pub const CHECKSUM_TRAILER_SIZE: usize = 3;
/// Mask for the 22-bit truncated stream hash.
pub const CHECKSUM_MASK: u32 = (1 << 22) - 1;

const TYPE_SHIFT: u32 = 6;
const FULL_BIT: u8 = 0x20;

/// Nominal block size in bytes for a block-size exponent.
pub fn block_size(id: u8) -> u32 {
    1 << (10 + u32::from(id))
}

/// Block type tag, bits 7-6 of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    /// Codec-compressed payload.
    Compressed = 0,
    /// Verbatim payload, stored because compression did not help.
    Raw = 1,
    /// One repeated byte.
    Rle = 2,
    /// Frame terminator carrying the stream checksum.
    Checksum = 3,
}

impl BlockType {
    fn from_tag(tag: u8) -> Self {
        match tag & 0x03 {
            0 => Self::Compressed,
            1 => Self::Raw,
            2 => Self::Rle,
            _ => Self::Checksum,
        }
    }
}

/// Decoded header of one data-bearing block.
///
/// The checksum terminator is not represented here; it is surfaced as
/// [`BlockStart::Checksum`] so the decode loop can switch to trailer
/// handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_type: BlockType,
    /// Payload length equals the frame's nominal block size, so the size
    /// field is elided on the wire.
    pub full: bool,
    /// Original payload length of this block.
    pub regenerated_size: u32,
    /// Coded payload length; only present for [`BlockType::Compressed`].
    pub compressed_size: Option<u32>,
}

impl BlockHeader {
    /// Header for a codec-compressed block.
    pub fn compressed(regenerated_size: u32, compressed_size: u32, nominal: u32) -> Self {
        Self {
            block_type: BlockType::Compressed,
            full: regenerated_size == nominal,
            regenerated_size,
            compressed_size: Some(compressed_size),
        }
    }

    /// Header for a verbatim block.
    pub fn raw(regenerated_size: u32, nominal: u32) -> Self {
        Self {
            block_type: BlockType::Raw,
            full: regenerated_size == nominal,
            regenerated_size,
            compressed_size: None,
        }
    }

    /// Header for a run-length block.
    pub fn rle(regenerated_size: u32, nominal: u32) -> Self {
        Self {
            block_type: BlockType::Rle,
            full: regenerated_size == nominal,
            regenerated_size,
            compressed_size: None,
        }
    }

    /// Serialize this header; returns the number of bytes written (1, 3, or 5).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut first = (self.block_type as u8) << TYPE_SHIFT;
        if self.full {
            first |= FULL_BIT;
        }
        writer.write_u8(first)?;
        let mut written = 1;

        if !self.full {
            // 65536 wraps to 0, which decode maps back to the nominal size.
            writer.write_u16::<BigEndian>(self.regenerated_size as u16)?;
            written += 2;
        }
        if let Some(compressed_size) = self.compressed_size {
            writer.write_u16::<BigEndian>(compressed_size as u16)?;
            written += 2;
        }
        Ok(written)
    }
}

/// Outcome of decoding the first byte of a block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStart {
    /// A data-bearing block follows.
    Data(BlockHeader),
    /// The frame's checksum trailer follows; no payload.
    Checksum,
}

/// Read one big-endian header size field, reporting EOF mid-field as a
/// framing truncation rather than a bare IO error.
fn read_size_field<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 2];
    let got = crate::read_fill(reader, &mut buf)?;
    if got != 2 {
        return Err(Error::Truncated {
            expected: 2,
            actual: got as u64,
        });
    }
    Ok(u32::from(u16::from_be_bytes(buf)))
}

/// Decode a block header whose first byte has already been read.
///
/// Reads the conditional size fields from `reader` and validates both sizes
/// against `nominal`.
pub fn read_block_header<R: Read>(first: u8, reader: &mut R, nominal: u32) -> Result<BlockStart> {
    let block_type = BlockType::from_tag(first >> TYPE_SHIFT);
    if block_type == BlockType::Checksum {
        return Ok(BlockStart::Checksum);
    }

    let full = first & FULL_BIT != 0;
    let regenerated_size = if full {
        nominal
    } else {
        match read_size_field(reader)? {
            0 => nominal,
            size => size,
        }
    };
    if regenerated_size > nominal {
        return Err(Error::BlockTooLarge {
            declared: regenerated_size,
            nominal,
        });
    }

    let compressed_size = if block_type == BlockType::Compressed {
        let size = read_size_field(reader)?;
        // The payload buffers on both sides are sized to the nominal block
        // size; a larger declared size is a corrupt header.
        if size > nominal {
            return Err(Error::BlockTooLarge {
                declared: size,
                nominal,
            });
        }
        Some(size)
    } else {
        None
    };

    Ok(BlockStart::Data(BlockHeader {
        block_type,
        full,
        regenerated_size,
        compressed_size,
    }))
}

/// Write the frame preamble: magic number plus block-size descriptor.
pub fn write_frame_header<W: Write>(writer: &mut W, magic: u32, block_size_id: u8) -> Result<()> {
    if block_size_id > MAX_BLOCK_SIZE_ID {
        return Err(Error::BlockSizeIdOutOfRange(block_size_id));
    }
    writer.write_u32::<LittleEndian>(magic)?;
    writer.write_u8(block_size_id)?;
    Ok(())
}

/// Read the frame preamble; returns the raw magic and the validated exponent.
///
/// Magic dispatch is the caller's job; only the exponent range is checked
/// here.
pub fn read_frame_header<R: Read>(reader: &mut R) -> Result<(u32, u8)> {
    let magic = reader.read_u32::<LittleEndian>()?;
    let block_size_id = reader.read_u8()?;
    if block_size_id > MAX_BLOCK_SIZE_ID {
        return Err(Error::BlockSizeIdOutOfRange(block_size_id));
    }
    Ok((magic, block_size_id))
}

/// Write the 3-byte checksum trailer terminating a frame.
///
/// Bits 23-22 carry the checksum type tag, the low 22 bits the truncated
/// stream hash, big-endian.
pub fn write_checksum_trailer<W: Write>(writer: &mut W, checksum: u32) -> Result<()> {
    let checksum = checksum & CHECKSUM_MASK;
    writer.write_u8(((BlockType::Checksum as u8) << TYPE_SHIFT) | (checksum >> 16) as u8)?;
    writer.write_u8((checksum >> 8) as u8)?;
    writer.write_u8(checksum as u8)?;
    Ok(())
}

/// Read the checksum value from a trailer whose first byte is `first`.
pub fn read_checksum_trailer<R: Read>(first: u8, reader: &mut R) -> Result<u32> {
    let high = u32::from(first & 0x3F);
    let mid = u32::from(reader.read_u8()?);
    let low = u32::from(reader.read_u8()?);
    Ok((high << 16) | (mid << 8) | low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(header: BlockHeader, nominal: u32) -> (BlockStart, usize) {
        let mut encoded = Vec::new();
        let written = header.write_to(&mut encoded).unwrap();
        assert_eq!(written, encoded.len());
        let mut cursor = Cursor::new(&encoded[1..]);
        let decoded = read_block_header(encoded[0], &mut cursor, nominal).unwrap();
        (decoded, written)
    }

    #[test]
    fn test_header_round_trip_all_types() {
        let nominal = block_size(5);
        for header in [
            BlockHeader::compressed(nominal, 17_000, nominal),
            BlockHeader::compressed(4464, 1200, nominal),
            BlockHeader::raw(nominal, nominal),
            BlockHeader::raw(300, nominal),
            BlockHeader::rle(nominal, nominal),
            BlockHeader::rle(1, nominal),
        ] {
            let (decoded, _) = round_trip(header, nominal);
            assert_eq!(decoded, BlockStart::Data(header));
        }
    }

    #[test]
    fn test_header_lengths() {
        let nominal = block_size(5);
        let (_, len) = round_trip(BlockHeader::raw(nominal, nominal), nominal);
        assert_eq!(len, 1);
        let (_, len) = round_trip(BlockHeader::raw(100, nominal), nominal);
        assert_eq!(len, 3);
        let (_, len) = round_trip(BlockHeader::compressed(nominal, 999, nominal), nominal);
        assert_eq!(len, 3);
        let (_, len) = round_trip(BlockHeader::compressed(100, 50, nominal), nominal);
        assert_eq!(len, 5);
    }

    #[test]
    fn test_zero_size_field_means_nominal() {
        // A 64 KiB regenerated size wraps to 0 in the 16-bit field.
        let nominal = block_size(MAX_BLOCK_SIZE_ID);
        let header = BlockHeader {
            block_type: BlockType::Raw,
            full: false,
            regenerated_size: nominal,
            compressed_size: None,
        };
        let (decoded, _) = round_trip(header, nominal);
        assert_eq!(decoded, BlockStart::Data(header));
    }

    #[test]
    fn test_oversized_block_rejected() {
        let nominal = block_size(0);
        // Explicitly non-full so the oversized value reaches the wire.
        let header = BlockHeader {
            block_type: BlockType::Raw,
            full: false,
            regenerated_size: 2048,
            compressed_size: None,
        };
        let mut encoded = Vec::new();
        header.write_to(&mut encoded).unwrap();
        assert_eq!(encoded.len(), 3);
        let mut cursor = Cursor::new(&encoded[1..]);
        let err = read_block_header(encoded[0], &mut cursor, nominal).unwrap_err();
        assert!(matches!(
            err,
            Error::BlockTooLarge {
                declared: 2048,
                nominal: 1024,
            }
        ));
    }

    #[test]
    fn test_oversized_compressed_size_rejected() {
        // Non-full compressed header: regenerated 512, compressed 2000,
        // against a 1 KiB nominal. The compressed size alone is corrupt.
        let nominal = block_size(0);
        let wire = [0x02, 0x00, 0x07, 0xD0];
        let mut cursor = Cursor::new(&wire[..]);
        let err = read_block_header(0x00, &mut cursor, nominal).unwrap_err();
        assert!(matches!(
            err,
            Error::BlockTooLarge {
                declared: 2000,
                nominal: 1024,
            }
        ));
    }

    #[test]
    fn test_truncated_header_reports_truncation() {
        // Non-full raw header with no size field behind it.
        let mut empty = Cursor::new(&[][..]);
        let err = read_block_header(0x40, &mut empty, 1024).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 2,
                actual: 0,
            }
        ));

        // Compressed header cut off after the regenerated size.
        let wire = [0x02, 0x00, 0x01];
        let mut cursor = Cursor::new(&wire[..]);
        let err = read_block_header(0x00, &mut cursor, 1024).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 2,
                actual: 1,
            }
        ));
    }

    #[test]
    fn test_checksum_start_tag() {
        let mut empty = Cursor::new(&[][..]);
        let start = read_block_header(0xC0, &mut empty, 1024).unwrap();
        assert_eq!(start, BlockStart::Checksum);
    }

    #[test]
    fn test_frame_header_round_trip() {
        let mut encoded = Vec::new();
        write_frame_header(&mut encoded, 0x1E7A_B309, 5).unwrap();
        assert_eq!(encoded.len(), FRAME_HEADER_SIZE);
        let (magic, id) = read_frame_header(&mut Cursor::new(&encoded)).unwrap();
        assert_eq!(magic, 0x1E7A_B309);
        assert_eq!(id, 5);
    }

    #[test]
    fn test_frame_header_rejects_bad_exponent() {
        let mut encoded = Vec::new();
        let err = write_frame_header(&mut encoded, 0x1E7A_B309, 7).unwrap_err();
        assert!(matches!(err, Error::BlockSizeIdOutOfRange(7)));

        let raw = [0x09, 0x23, 0x3E, 0x18, 0x0A];
        let err = read_frame_header(&mut Cursor::new(&raw)).unwrap_err();
        assert!(matches!(err, Error::BlockSizeIdOutOfRange(10)));
    }

    #[test]
    fn test_checksum_trailer_round_trip() {
        let mut encoded = Vec::new();
        write_checksum_trailer(&mut encoded, 0x2A_BCDE).unwrap();
        assert_eq!(encoded.len(), CHECKSUM_TRAILER_SIZE);
        assert_eq!(encoded[0] >> 6, BlockType::Checksum as u8);
        let mut cursor = Cursor::new(&encoded[1..]);
        let value = read_checksum_trailer(encoded[0], &mut cursor).unwrap();
        assert_eq!(value, 0x2A_BCDE);
    }
}
