//! Running stream checksum
//!
//! Accumulates xxh32 over every payload byte in encounter order; the stored
//! form discards the low 5 bits and keeps 22 bits, matching the trailer
//! layout in [`crate::frame`].

use xxhash_rust::xxh32::Xxh32;

use crate::frame::CHECKSUM_MASK;

const CHECKSUM_SEED: u32 = 0;

/// Order-dependent hash over the original (or regenerated) payload bytes of
/// one frame.
// No Debug derive; `Xxh32` does not implement it.
#[derive(Clone)]
pub struct RunningChecksum {
    state: Xxh32,
}

impl RunningChecksum {
    pub fn new() -> Self {
        Self {
            state: Xxh32::new(CHECKSUM_SEED),
        }
    }

    /// Fold `data` into the checksum. Split deliveries of the same bytes
    /// produce the same digest as a single delivery.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// The 22-bit truncated digest stored in the frame trailer.
    pub fn truncated(&self) -> u32 {
        (self.state.digest() >> 5) & CHECKSUM_MASK
    }
}

impl Default for RunningChecksum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_updates_match_single_update() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut whole = RunningChecksum::new();
        whole.update(&data);

        let mut split = RunningChecksum::new();
        for part in data.chunks(333) {
            split.update(part);
        }

        assert_eq!(whole.truncated(), split.truncated());
    }

    #[test]
    fn test_order_dependent() {
        let mut forward = RunningChecksum::new();
        forward.update(b"ab");
        let mut reverse = RunningChecksum::new();
        reverse.update(b"ba");
        assert_ne!(forward.truncated(), reverse.truncated());
    }

    #[test]
    fn test_clone_is_independent_snapshot() {
        let mut original = RunningChecksum::new();
        original.update(b"shared prefix");

        let mut forked = original.clone();
        assert_eq!(original.truncated(), forked.truncated());

        forked.update(b"divergence");
        assert_ne!(original.truncated(), forked.truncated());
    }

    #[test]
    fn test_fits_in_22_bits() {
        let mut sum = RunningChecksum::new();
        sum.update(&[0xFF; 4096]);
        assert_eq!(sum.truncated() & !CHECKSUM_MASK, 0);
    }
}
