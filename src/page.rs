//! Collaborator interfaces to the host video page
//!
//! The engine never touches the page directly. The embedding application
//! implements these traits over whatever the host environment provides
//! (DOM queries, player APIs, overlay widgets) and hands them in as trait
//! objects when constructing the controller.

use serde::{Deserialize, Serialize};

/// Currently displayed caption fragment, polled rather than pushed
pub trait CaptionSource: Send + Sync {
    /// The fragment the caption renderer is showing right now, if any
    fn current_fragment(&self) -> Option<String>;
}

/// Minimal playback control surface
pub trait PlaybackControl: Send + Sync {
    fn is_playing(&self) -> bool;
    fn pause(&self);
}

/// Page metadata used to fill the initial prompt template
pub trait MetadataProvider: Send + Sync {
    fn metadata(&self) -> VideoMetadata;
}

/// Rendering side of the conversation overlay.
///
/// The engine only reports what happened; bubble styling, markup and layout
/// are entirely the implementor's concern.
pub trait PresentationSurface: Send + Sync {
    fn render_assistant_turn(&self, text: &str);
    fn render_user_turn(&self, text: &str);
    fn render_banner(&self, text: &str);
    fn show_loading(&self);
    fn hide_loading(&self);
}

/// Plain-string page metadata; every field may be empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_title: String,
    pub video_description: String,
    pub hashtags: String,
    pub channel_name: String,
}

/// Substitute page metadata into an initial-prompt template.
///
/// Recognized placeholders: `{video_title}`, `{video_description}`,
/// `{hashtags}` and `{channel_name}`.
pub fn render_initial_prompt(template: &str, meta: &VideoMetadata) -> String {
    template
        .replace("{video_title}", &meta.video_title)
        .replace("{video_description}", &meta.video_description)
        .replace("{hashtags}", &meta.hashtags)
        .replace("{channel_name}", &meta.channel_name)
}
