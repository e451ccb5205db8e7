//! Background caption sampler
//!
//! The always-running periodic poll of the caption source. Every observation
//! goes through [`CaptionBuffer::ingest`], so the polling cadence here is
//! swappable for an event-driven push source without touching the windowing
//! logic. The triggered capture sequencer feeds the same buffer through the
//! same call; the buffer's dedup rule reconciles the two producers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::EngineClock;
use crate::page::CaptionSource;

use super::buffer::CaptionBuffer;

/// Default caption polling cadence
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Handle to a running sampler task
pub struct SamplerHandle {
    stop: Arc<AtomicBool>,
}

impl SamplerHandle {
    /// Ask the sampler task to exit at its next tick
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Spawn the periodic sampling task.
///
/// Runs until the returned handle is stopped. Each tick polls the caption
/// source once and ingests whatever fragment it is currently showing.
pub fn spawn_sampler(
    source: Arc<dyn CaptionSource>,
    buffer: Arc<Mutex<CaptionBuffer>>,
    clock: EngineClock,
    poll_interval_ms: u64,
) -> SamplerHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let task_stop = stop.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(poll_interval_ms));
        info!(poll_interval_ms, "caption sampler started");

        loop {
            interval.tick().await;
            if task_stop.load(Ordering::SeqCst) {
                debug!("caption sampler stopping");
                break;
            }
            if let Some(fragment) = source.current_fragment() {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.ingest(&fragment, clock.now_ms());
                }
            }
        }
    });

    SamplerHandle { stop }
}
