//! Live transcript capture and windowing
//!
//! Three pieces: the sliding-window [`buffer`] of observed caption
//! fragments, the pure [`window`] derivation that turns a buffer snapshot
//! into a bounded context string, and the background [`sampler`] that polls
//! the caption source on a fixed cadence.

mod buffer;
mod sampler;
mod window;

pub use buffer::{CaptionBuffer, CaptionSample, DEFAULT_RETENTION_MS};
pub use sampler::{spawn_sampler, SamplerHandle, DEFAULT_POLL_INTERVAL_MS};
pub use window::{
    extract_recent_words, format_time_range, transcript_window, trim_transcript,
    TranscriptLimits, TranscriptWindow, CHARS_PER_WORD_ESTIMATE, DEFAULT_MAX_TRANSCRIPT_CHARS,
    ELLIPSIS,
};
