//! Bounded transcript view over the caption buffer
//!
//! Derives a single context string plus a human-readable time range from a
//! buffer snapshot. The derivation is a pure function: it never stores
//! anything and never mutates the buffer, so calling it twice on the same
//! snapshot yields identical output.

use super::buffer::CaptionSample;

/// Marker prefixed to a transcript that lost its front to the character budget
pub const ELLIPSIS: &str = "...";

/// Default transcript character budget
pub const DEFAULT_MAX_TRANSCRIPT_CHARS: usize = 500;

/// Crude words-to-characters heuristic used when only a word budget is set
pub const CHARS_PER_WORD_ESTIMATE: usize = 8;

/// Budget applied when deriving the transcript text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptLimits {
    /// Optional word budget; when set, the joined text is focused to its
    /// trailing words before the character trim
    pub max_words: Option<usize>,
    /// Character budget for the final text (exclusive of the ellipsis)
    pub max_chars: usize,
}

impl Default for TranscriptLimits {
    fn default() -> Self {
        Self {
            max_words: None,
            max_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
        }
    }
}

/// Read-only transcript view; `range` is `mm:ss → mm:ss` from the oldest
/// sample to now
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptWindow {
    pub text: String,
    pub range: String,
}

/// Derive the bounded transcript from a buffer snapshot.
///
/// An empty snapshot yields empty text and an empty range. Otherwise the
/// sample texts are joined with single spaces and trimmed from the front to
/// the character budget, with an [`ELLIPSIS`] prefix when truncation
/// occurred.
pub fn transcript_window(
    samples: &[CaptionSample],
    limits: &TranscriptLimits,
    now_ms: u64,
) -> TranscriptWindow {
    let Some(oldest) = samples.first() else {
        return TranscriptWindow::default();
    };

    let joined = samples
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let focused = match limits.max_words {
        Some(max_words) => extract_recent_words(&joined, max_words),
        None => joined,
    };

    TranscriptWindow {
        text: trim_transcript(&focused, limits.max_chars),
        range: format_time_range(oldest.observed_at_ms, now_ms),
    }
}

/// Keep only the last `max_chars` characters, marking the cut with an
/// ellipsis. Operates on characters, not bytes: caption fragments are
/// opaque Unicode strings.
pub fn trim_transcript(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    let tail: String = text
        .chars()
        .skip(char_count - max_chars)
        .collect();
    format!("{ELLIPSIS}{tail}")
}

/// Keep only the trailing `max_words` whitespace-separated words
pub fn extract_recent_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(max_words);
    words[start..].join(" ")
}

/// Render a `mm:ss → mm:ss` span between two engine-clock timestamps
pub fn format_time_range(start_ms: u64, end_ms: u64) -> String {
    format!("{} → {}", format_clock(start_ms), format_clock(end_ms))
}

fn format_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
