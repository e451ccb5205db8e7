//! Monotonic engine clock
//!
//! All caption timestamps are milliseconds since the engine attached to the
//! page. Built on the tokio clock so time-driven code stays deterministic
//! under `tokio::time::pause`.

use tokio::time::Instant;

/// Millisecond clock anchored at engine construction
#[derive(Debug, Clone, Copy)]
pub struct EngineClock {
    epoch: Instant,
}

impl EngineClock {
    /// Anchor a new clock at the current instant
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was anchored
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::new()
    }
}
