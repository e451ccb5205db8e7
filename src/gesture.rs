//! Trigger-gesture recognition
//!
//! Two independent recognizers feed the same downstream capture path: a
//! configurable modifier chord, and a double press of a designated key
//! within a short window. The detector only classifies raw key events; it
//! never runs the capture itself. The chord check runs first and returns
//! early, so a single physical action can fire at most one trigger.

use tracing::debug;

/// Window within which two presses of the designated key count as one trigger
pub const DOUBLE_TAP_WINDOW_MS: u64 = 400;

/// Physical-key code of the default double-press key
pub const DEFAULT_DOUBLE_TAP_CODE: &str = "Space";

/// Where a key event was aimed on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    /// The page at large (player, body, ...)
    Page,
    /// An `<input>` or `<textarea>` style element
    TextInput,
    /// A content-editable region
    Editable,
}

impl KeyTarget {
    fn accepts_text(self) -> bool {
        matches!(self, KeyTarget::TextInput | KeyTarget::Editable)
    }
}

/// One raw key event as reported by the host page
#[derive(Debug, Clone)]
pub struct KeyEvent {
    /// Logical key value (layout-dependent), e.g. `" "` or `"e"`
    pub key: String,
    /// Physical-key code, e.g. `"Space"` or `"KeyE"`
    pub code: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub target: KeyTarget,
}

/// Which recognizer fired; behavior downstream is identical, the kind only
/// feeds logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Chord,
    DoubleTap,
}

/// What the host should do with the event it just reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyDisposition {
    /// A trigger fired; the host should run the capture sequence
    pub trigger: Option<TriggerKind>,
    /// The host should cancel its default handling of this event
    pub inhibit_default: bool,
}

/// Parsed shortcut descriptor, e.g. `"ctrl+shift+space"`.
///
/// The last `+`-separated token is the key; the rest name modifiers. The
/// literal token `space` is mapped to the space character for comparison
/// against the logical key value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    ctrl: bool,
    shift: bool,
    alt: bool,
    meta: bool,
    key: String,
}

impl Shortcut {
    /// Parse a descriptor string; `None` when it is empty
    pub fn parse(descriptor: &str) -> Option<Self> {
        let descriptor = descriptor.trim().to_lowercase();
        if descriptor.is_empty() {
            return None;
        }
        let mut parts: Vec<&str> = descriptor.split('+').map(str::trim).collect();
        let mut key = parts.pop()?.to_string();
        if key.is_empty() {
            return None;
        }
        if key == "space" {
            key = " ".to_string();
        }
        Some(Self {
            ctrl: parts.contains(&"ctrl"),
            shift: parts.contains(&"shift"),
            alt: parts.contains(&"alt"),
            meta: parts.contains(&"meta"),
            key,
        })
    }

    /// Exact-modifier chord match: every modifier flag must equal the
    /// event's state, and the logical key or physical code must match the
    /// key token.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if self.ctrl != event.ctrl
            || self.shift != event.shift
            || self.alt != event.alt
            || self.meta != event.meta
        {
            return false;
        }
        let code_needle = self.key.replace(' ', "space");
        event.key.to_lowercase() == self.key
            || event.code.to_lowercase().contains(&code_needle)
    }
}

/// Per-key-stream recognizer state
pub struct GestureDetector {
    shortcut: Option<Shortcut>,
    double_tap_code: String,
    last_tap_ms: Option<u64>,
    suppress_next_release: bool,
}

impl GestureDetector {
    pub fn new(shortcut: Option<Shortcut>) -> Self {
        Self {
            shortcut,
            double_tap_code: DEFAULT_DOUBLE_TAP_CODE.to_string(),
            last_tap_ms: None,
            suppress_next_release: false,
        }
    }

    /// Use a different designated key for the double-press recognizer
    pub fn with_double_tap_code(mut self, code: impl Into<String>) -> Self {
        self.double_tap_code = code.into();
        self
    }

    /// Classify a key-down event.
    ///
    /// The chord recognizer is checked first and wins outright. The
    /// double-press recognizer ignores events aimed at text inputs and
    /// editable regions entirely: the key passes through untouched and no
    /// state changes. A lone first press only records its timestamp; its
    /// default handling proceeds. A second press within
    /// [`DOUBLE_TAP_WINDOW_MS`] fires the trigger, inhibits default
    /// handling, marks the matching release for suppression and resets the
    /// timer; presses further apart each count as a fresh first tap.
    pub fn on_key_down(&mut self, event: &KeyEvent, now_ms: u64) -> KeyDisposition {
        if let Some(shortcut) = &self.shortcut {
            if shortcut.matches(event) {
                debug!(key = %event.key, code = %event.code, "chord trigger matched");
                return KeyDisposition {
                    trigger: Some(TriggerKind::Chord),
                    inhibit_default: true,
                };
            }
        }

        if event.code != self.double_tap_code || event.target.accepts_text() {
            return KeyDisposition::default();
        }

        match self.last_tap_ms {
            Some(last) if now_ms.saturating_sub(last) < DOUBLE_TAP_WINDOW_MS => {
                debug!(elapsed_ms = now_ms - last, "double-tap trigger matched");
                self.last_tap_ms = None;
                self.suppress_next_release = true;
                KeyDisposition {
                    trigger: Some(TriggerKind::DoubleTap),
                    inhibit_default: true,
                }
            }
            _ => {
                self.last_tap_ms = Some(now_ms);
                self.suppress_next_release = false;
                KeyDisposition::default()
            }
        }
    }

    /// Classify a key-up event; suppresses the release that completed a
    /// double press so the page does not also react to it.
    pub fn on_key_up(&mut self, event: &KeyEvent) -> KeyDisposition {
        if self.suppress_next_release && event.code == self.double_tap_code {
            self.suppress_next_release = false;
            return KeyDisposition {
                trigger: None,
                inhibit_default: true,
            };
        }
        KeyDisposition::default()
    }
}
