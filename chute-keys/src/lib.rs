//! Per-block keystream selection for the chute container format.
//!
//! Each block of a chute frame carries a *scrambler value*: an unsigned
//! scalar derived from an optional caller-supplied secret and the block's
//! position in the frame. The value is forwarded into every codec call on
//! both the encode and decode side, so the derivation must be deterministic
//! and must advance identically on both sides.
//!
//! This is a per-block tag for payload scrambling, not a cryptographic
//! primitive. Do not rely on it for confidentiality.

use xxhash_rust::xxh32::xxh32;

/// Derives one scrambler value per block from an optional secret.
///
/// Without a secret the selector is a no-op pass-through: every block gets
/// the constant zero. With a secret, block `i` gets
/// `xxh32(secret, seed = i)`, so consecutive blocks of the same stream see
/// unrelated values while the mapping stays fully reproducible.
#[derive(Debug, Clone, Default)]
pub struct KeystreamSelector {
    secret: Option<Vec<u8>>,
}

impl KeystreamSelector {
    /// Create a selector from an optional secret string.
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.map(|s| s.as_bytes().to_vec()),
        }
    }

    /// True if a secret was supplied.
    pub fn is_keyed(&self) -> bool {
        self.secret.is_some()
    }

    /// Scrambler value for the block at `block_index`.
    ///
    /// Indices start at 0 and increase by exactly one per block processed.
    pub fn scrambler(&self, block_index: u32) -> u32 {
        match &self.secret {
            None => 0,
            Some(secret) => xxh32(secret, block_index),
        }
    }

    /// Stateful cursor over this selector, yielding one value per block.
    pub fn cursor(&self) -> KeystreamCursor<'_> {
        KeystreamCursor {
            selector: self,
            next_index: 0,
        }
    }
}

/// Tracks the monotonically increasing block index for one frame.
///
/// Created via [`KeystreamSelector::cursor`]. Both pumps call [`next`]
/// exactly once per block, which keeps the encode and decode sides in step.
///
/// [`next`]: KeystreamCursor::next
#[derive(Debug)]
pub struct KeystreamCursor<'a> {
    selector: &'a KeystreamSelector,
    next_index: u32,
}

impl KeystreamCursor<'_> {
    /// Scrambler value for the current block; advances to the next block.
    pub fn next(&mut self) -> u32 {
        let value = self.selector.scrambler(self.next_index);
        self.next_index += 1;
        value
    }

    /// Number of blocks consumed so far.
    pub fn blocks_seen(&self) -> u32 {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_secret_is_zero() {
        let selector = KeystreamSelector::new(None);
        assert!(!selector.is_keyed());
        for index in [0, 1, 17, u32::MAX] {
            assert_eq!(selector.scrambler(index), 0);
        }
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = KeystreamSelector::new(Some("hunter2"));
        let b = KeystreamSelector::new(Some("hunter2"));
        for index in 0..64 {
            assert_eq!(a.scrambler(index), b.scrambler(index));
        }
    }

    #[test]
    fn test_blocks_get_distinct_values() {
        let selector = KeystreamSelector::new(Some("hunter2"));
        let v0 = selector.scrambler(0);
        let v1 = selector.scrambler(1);
        let v2 = selector.scrambler(2);
        assert_ne!(v0, v1);
        assert_ne!(v1, v2);
        assert_ne!(v0, v2);
    }

    #[test]
    fn test_different_secrets_diverge() {
        let a = KeystreamSelector::new(Some("hunter2"));
        let b = KeystreamSelector::new(Some("hunter3"));
        assert_ne!(a.scrambler(0), b.scrambler(0));
    }

    #[test]
    fn test_cursor_advances_once_per_block() {
        let selector = KeystreamSelector::new(Some("secret"));
        let mut cursor = selector.cursor();
        let first = cursor.next();
        let second = cursor.next();
        assert_eq!(first, selector.scrambler(0));
        assert_eq!(second, selector.scrambler(1));
        assert_eq!(cursor.blocks_seen(), 2);
    }
}
