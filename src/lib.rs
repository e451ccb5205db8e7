#![deny(clippy::all)]

//! On-demand conversational assistant grounded in recently displayed
//! captions.
//!
//! The engine watches the caption fragments a video page renders, keeps a
//! short sliding window of them, and turns a trigger gesture (a configured
//! chord or a quick double press of a designated key) into a bounded,
//! time-ordered transcript that grounds a multi-turn conversation with a
//! remote text-completion service.
//!
//! Everything page-specific sits behind the collaborator traits in
//! [`page`]: the embedding application supplies the caption source,
//! playback control, metadata provider and presentation surface, then
//! drives a [`controller::SessionController`] from its input event loop:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use elaborator::controller::{HostBindings, SessionController};
//! # use elaborator::settings::Settings;
//! # fn bindings() -> HostBindings { unimplemented!() }
//! # async fn run() -> anyhow::Result<()> {
//! let settings = Settings::load();
//! let mut controller = SessionController::with_http_backend(settings, bindings())?;
//! let _sampler = controller.start_sampler();
//! // host event loop: feed key events via controller.on_key_down /
//! // on_key_up, run controller.activate(kind) on a trigger, forward
//! // overlay input through controller.send_user_message(...)
//! # Ok(())
//! # }
//! ```

pub mod ask;
pub mod captions;
pub mod capture;
pub mod clock;
pub mod controller;
pub mod error;
pub mod gesture;
pub mod page;
pub mod session;
pub mod settings;

pub use ask::{AskBackend, AskReply, AskRequest, HttpAskClient};
pub use captions::{CaptionBuffer, CaptionSample, TranscriptLimits, TranscriptWindow};
pub use capture::{CaptureSequencer, CapturedTranscript};
pub use controller::{DismissHandle, HostBindings, SessionController, SessionState};
pub use error::AskError;
pub use gesture::{GestureDetector, KeyDisposition, KeyEvent, KeyTarget, Shortcut, TriggerKind};
pub use page::{
    CaptionSource, MetadataProvider, PlaybackControl, PresentationSurface, VideoMetadata,
};
pub use session::{ConversationSession, ConversationTurn, Speaker};
pub use settings::Settings;
