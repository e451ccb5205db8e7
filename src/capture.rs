//! Triggered capture sequence
//!
//! Turning a gesture into a transcript is not a single read: pausing
//! playback changes the caption renderer's update timing, so fragments can
//! land just after the triggering action. The sequencer therefore samples
//! the caption source a fixed number of additional times before finalizing,
//! then patches in the single most recent raw fragment if the windowed text
//! does not already end with it.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::captions::{transcript_window, CaptionBuffer, TranscriptLimits};
use crate::clock::EngineClock;
use crate::page::{CaptionSource, PlaybackControl};

/// Number of sampling ticks per capture
pub const CAPTURE_TICKS: u32 = 6;

/// Spacing between sampling ticks
pub const CAPTURE_TICK_INTERVAL_MS: u64 = 250;

/// Finalized capture output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedTranscript {
    /// Bounded, time-ordered context string (may be empty when the caption
    /// source never yielded text)
    pub text: String,
    /// `mm:ss → mm:ss` span of the captured history
    pub range: String,
}

/// Fixed-count, fixed-interval poll loop over the caption source
pub struct CaptureSequencer {
    source: Arc<dyn CaptionSource>,
    playback: Arc<dyn PlaybackControl>,
    buffer: Arc<Mutex<CaptionBuffer>>,
    limits: TranscriptLimits,
    clock: EngineClock,
}

impl CaptureSequencer {
    pub fn new(
        source: Arc<dyn CaptionSource>,
        playback: Arc<dyn PlaybackControl>,
        buffer: Arc<Mutex<CaptionBuffer>>,
        limits: TranscriptLimits,
        clock: EngineClock,
    ) -> Self {
        Self {
            source,
            playback,
            buffer,
            limits,
            clock,
        }
    }

    /// Run one capture sequence to completion.
    ///
    /// Pauses playback if currently playing (no-op otherwise), runs exactly
    /// [`CAPTURE_TICKS`] sampling ticks at [`CAPTURE_TICK_INTERVAL_MS`]
    /// spacing (the first tick fires immediately) and finalizes the
    /// transcript from the buffer window plus the most-recent-fragment
    /// patch. The caller is responsible for never starting a second
    /// sequence while one is in flight.
    pub async fn capture(&self) -> CapturedTranscript {
        if self.playback.is_playing() {
            debug!("pausing playback for capture");
            self.playback.pause();
        }

        let mut interval =
            tokio::time::interval(Duration::from_millis(CAPTURE_TICK_INTERVAL_MS));
        for _ in 0..CAPTURE_TICKS {
            interval.tick().await;
            if let Some(fragment) = self.source.current_fragment() {
                if let Ok(mut buffer) = self.buffer.lock() {
                    buffer.ingest(&fragment, self.clock.now_ms());
                }
            }
        }

        let window = match self.buffer.lock() {
            Ok(buffer) => transcript_window(buffer.snapshot(), &self.limits, self.clock.now_ms()),
            Err(_) => Default::default(),
        };

        let mut text = window.text;
        // The last fragment may have arrived between the final tick and this
        // read; patch it in unless the window already ends with it.
        if let Some(newest) = self.source.current_fragment() {
            let newest = newest.trim();
            if !newest.is_empty() && !text.ends_with(newest) {
                if text.is_empty() {
                    text = newest.to_string();
                } else {
                    text.push(' ');
                    text.push_str(newest);
                }
            }
        }

        info!(
            chars = text.chars().count(),
            range = %window.range,
            "capture sequence finalized"
        );
        CapturedTranscript {
            text,
            range: window.range,
        }
    }
}
