//! Sliding-window caption history
//!
//! Ingests raw caption-fragment observations, drops consecutive duplicates
//! and retains only the fragments observed within the retention window.
//! The buffer is the single source of truth for "what was recently said";
//! everything downstream derives read-only views from its snapshot.

/// Default retention window for caption samples
pub const DEFAULT_RETENTION_MS: u64 = 20_000;

/// One observed caption fragment, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionSample {
    /// Trimmed fragment text as displayed by the caption renderer
    pub text: String,
    /// Milliseconds (engine clock) at which the fragment was observed
    pub observed_at_ms: u64,
}

/// Ordered caption history; insertion order is chronological order
#[derive(Debug)]
pub struct CaptionBuffer {
    samples: Vec<CaptionSample>,
    retention_ms: u64,
}

impl CaptionBuffer {
    /// Create an empty buffer with the given retention window
    pub fn new(retention_ms: u64) -> Self {
        Self {
            samples: Vec::new(),
            retention_ms,
        }
    }

    /// Record one observation of the caption source.
    ///
    /// Empty or whitespace-only text is ignored, as is text identical to the
    /// last retained sample (consecutive duplicates are the only
    /// deduplication rule; non-consecutive repeats are kept). An accepted
    /// observation is appended and then every sample older than the
    /// retention window is pruned. Pruning happens only here, so reads
    /// between ingestions may briefly see samples past their window.
    pub fn ingest(&mut self, text: &str, now_ms: u64) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.samples.last().is_some_and(|last| last.text == text) {
            return;
        }

        self.samples.push(CaptionSample {
            text: text.to_string(),
            observed_at_ms: now_ms,
        });
        self.samples
            .retain(|s| now_ms.saturating_sub(s.observed_at_ms) < self.retention_ms);
    }

    /// Current ordered samples, oldest first
    pub fn snapshot(&self) -> &[CaptionSample] {
        &self.samples
    }
}

impl Default for CaptionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_MS)
    }
}
