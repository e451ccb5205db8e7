//! Conversation session state
//!
//! An append-only, turn-ordered log of one overlay lifetime. The session
//! owns no network state and no caption history: the grounding transcript
//! it holds is a snapshot string received from the capture path, distinct
//! from the running turn history sent with follow-up requests.

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Label used when serializing turn history for a follow-up request
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Assistant => "Assistant",
        }
    }
}

/// One exchange entry; never mutated or removed once appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Ordered turn log for one overlay lifetime
#[derive(Debug, Default)]
pub struct ConversationSession {
    turns: Vec<ConversationTurn>,
    grounding_transcript: String,
}

impl ConversationSession {
    /// Open a session around the transcript that grounded its first request
    pub fn new(grounding_transcript: String) -> Self {
        Self {
            turns: Vec::new(),
            grounding_transcript,
        }
    }

    /// Transcript the first request of this session was grounded in
    pub fn grounding_transcript(&self) -> &str {
        &self.grounding_transcript
    }

    /// Replace the grounding transcript (re-activation into a retained
    /// session grounds subsequent context in the fresh capture)
    pub fn set_grounding_transcript(&mut self, transcript: String) {
        self.grounding_transcript = transcript;
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn {
            speaker: Speaker::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn {
            speaker: Speaker::Assistant,
            text: text.into(),
        });
    }

    /// Turns in exactly the order they were sent/received
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Running transcript for the next follow-up request: labeled turns
    /// joined with blank lines.
    pub fn history_text(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker.label(), turn.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
