//! Rate-limited progress reporting
//!
//! Purely observational: sampling is wall-clock bounded and never feeds back
//! into control flow.

use std::time::{Duration, Instant};
use tracing::debug;

const REFRESH: Duration = Duration::from_millis(150);

pub(crate) struct Progress {
    last: Instant,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Emit a progress line if the refresh interval has elapsed.
    pub fn update(&mut self, bytes_read: u64, bytes_written: u64) {
        if self.last.elapsed() >= REFRESH {
            debug!(bytes_read, bytes_written, "progress");
            self.last = Instant::now();
        }
    }
}
