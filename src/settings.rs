//! Engine configuration
//!
//! Values are layered: crate defaults (embedded `config.toml`), then an
//! optional user file in the platform config directory, then environment
//! overrides loaded via `.env`. Every value has a hardcoded default and a
//! missing or unreadable layer is never fatal.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use crate::captions::{
    TranscriptLimits, CHARS_PER_WORD_ESTIMATE, DEFAULT_MAX_TRANSCRIPT_CHARS,
};
use crate::gesture::Shortcut;

/// Built-in defaults, shipped with the crate
const EMBEDDED_CONFIG: &str = include_str!("../config.toml");

/// Environment variable overriding the ask endpoint URL
pub const ASK_URL_ENV: &str = "ELABORATOR_ASK_URL";

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub caption: CaptionSettings,
    #[serde(default)]
    pub shortcuts: ShortcutSettings,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub prompts: PromptSettings,
    #[serde(default)]
    pub overlay: OverlaySettings,
}

/// Caption capture tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSettings {
    /// Optional word budget for the transcript; characters are derived from
    /// it when set
    #[serde(default)]
    pub max_words: Option<usize>,
    /// Caption retention window in seconds
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Background sampler cadence in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
}

/// Trigger shortcut configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutSettings {
    /// Chord descriptor, e.g. `"ctrl+shift+space"`; an empty string
    /// disables the chord recognizer
    #[serde(default = "default_activate_chat")]
    pub activate_chat: String,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Ask endpoint URL
    #[serde(default = "default_ask_url")]
    pub ask_url: String,
    /// Outbound request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Prompt templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Initial system prompt template; placeholders `{video_title}`,
    /// `{video_description}`, `{hashtags}` and `{channel_name}` are
    /// substituted from page metadata
    #[serde(default = "default_initial_prompt")]
    pub initial: String,
}

/// Overlay behavior visible to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Render the grounding banner alongside the first reply
    #[serde(default = "default_true")]
    pub show_initial_message: bool,
    /// Keep the existing turn log when a trigger fires while the overlay is
    /// already open; false starts a fresh session
    #[serde(default)]
    pub retain_history_on_reactivate: bool,
}

fn default_retention_secs() -> u64 {
    20
}

fn default_polling_interval_ms() -> u64 {
    500
}

fn default_activate_chat() -> String {
    "ctrl+shift+space".to_string()
}

fn default_ask_url() -> String {
    crate::ask::DEFAULT_ASK_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_initial_prompt() -> String {
    "You are a helpful assistant embedded in a video page. The viewer paused on a moment \
     they want explained. Video title: {video_title}. Channel: {channel_name}. Description: \
     {video_description}. Hashtags: {hashtags}. Using the caption transcript provided, \
     explain and elaborate on what was just said, briefly and clearly."
        .to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            max_words: None,
            retention_secs: default_retention_secs(),
            polling_interval_ms: default_polling_interval_ms(),
        }
    }
}

impl Default for ShortcutSettings {
    fn default() -> Self {
        Self {
            activate_chat: default_activate_chat(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            ask_url: default_ask_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            initial: default_initial_prompt(),
        }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            show_initial_message: default_true(),
            retain_history_on_reactivate: false,
        }
    }
}

/// Get the user configuration file path
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Elaborator").join("config.toml"))
}

impl Settings {
    /// Load settings: embedded defaults, then the user file if present,
    /// then environment overrides. Never fails; a broken layer is logged
    /// and skipped.
    pub fn load() -> Settings {
        let mut settings: Settings = match toml::from_str(EMBEDDED_CONFIG) {
            Ok(settings) => settings,
            Err(e) => {
                error!("Failed to parse embedded config: {}", e);
                Settings::default()
            }
        };

        if let Some(path) = user_config_path() {
            if path.exists() {
                match fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str(&contents) {
                        Ok(user) => {
                            info!("Loaded user config from {:?}", path);
                            settings = user;
                        }
                        Err(e) => error!("Failed to parse user config {:?}: {}", path, e),
                    },
                    Err(e) => error!("Failed to read user config {:?}: {}", path, e),
                }
            }
        }

        settings.apply_env_overrides();
        settings
    }

    /// Apply environment overrides, loading a `.env` file first if one is
    /// present
    fn apply_env_overrides(&mut self) {
        let _ = dotenvy::dotenv();
        if let Ok(url) = std::env::var(ASK_URL_ENV) {
            match url::Url::parse(&url) {
                Ok(_) => {
                    info!(%url, "Ask URL overridden from environment");
                    self.service.ask_url = url;
                }
                Err(e) => error!("Ignoring invalid {} value: {}", ASK_URL_ENV, e),
            }
        }
    }

    /// Validate values that must be well-formed before wiring the engine
    pub fn validate(&self) -> Result<(), SettingsError> {
        url::Url::parse(&self.service.ask_url)?;
        Ok(())
    }

    /// Caption retention window
    pub fn retention_ms(&self) -> u64 {
        self.caption.retention_secs * 1000
    }

    /// Transcript budget: the character budget derives from the word budget
    /// when one is configured (1 word ≈ 8 characters)
    pub fn transcript_limits(&self) -> TranscriptLimits {
        TranscriptLimits {
            max_words: self.caption.max_words,
            max_chars: self
                .caption
                .max_words
                .map(|words| words * CHARS_PER_WORD_ESTIMATE)
                .unwrap_or(DEFAULT_MAX_TRANSCRIPT_CHARS),
        }
    }

    /// Parsed chord shortcut, if one is configured
    pub fn activate_shortcut(&self) -> Option<Shortcut> {
        Shortcut::parse(&self.shortcuts.activate_chat)
    }

    /// Outbound request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_secs)
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid ask URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
