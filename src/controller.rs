//! Session orchestration
//!
//! Connects gesture recognition, the capture sequence, the ask backend and
//! the conversation session for one page-attach lifecycle. All state lives
//! in this controller instance; nothing is ambient. Work is single-threaded
//! cooperative: the host drives the controller from its event loop, and the
//! only suspension points are the capture ticks and the network calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::ask::{AskBackend, AskRequest, HttpAskClient};
use crate::capture::{CaptureSequencer, CapturedTranscript};
use crate::captions::{spawn_sampler, CaptionBuffer, SamplerHandle};
use crate::clock::EngineClock;
use crate::gesture::{GestureDetector, KeyDisposition, KeyEvent, TriggerKind};
use crate::page::{
    render_initial_prompt, CaptionSource, MetadataProvider, PlaybackControl,
    PresentationSurface,
};
use crate::session::ConversationSession;
use crate::settings::Settings;

/// Per-activation lifecycle of the conversation overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No overlay; triggers are accepted
    Idle,
    /// Capture sequence in flight; further triggers are ignored
    Capturing,
    /// Initial request in flight
    AwaitingInitialReply,
    /// Overlay open, ready for user input or a re-trigger
    Displayed,
    /// Follow-up request in flight
    AwaitingFollowupReply,
    /// Overlay dismissed; a new trigger starts a fresh activation
    Closed,
}

/// Collaborator implementations supplied by the embedding application
pub struct HostBindings {
    pub source: Arc<dyn CaptionSource>,
    pub playback: Arc<dyn PlaybackControl>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub surface: Arc<dyn PresentationSurface>,
}

/// Signal handle the presentation surface uses to report dismissal.
///
/// Dismissal invalidates the in-flight request token: a reply that arrives
/// for a dismissed session is swallowed instead of resurrecting the
/// overlay.
#[derive(Clone)]
pub struct DismissHandle {
    generation: Arc<AtomicU64>,
}

impl DismissHandle {
    pub fn dismiss(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Orchestrates gesture → capture → ask → conversation for one page
pub struct SessionController {
    settings: Settings,
    source: Arc<dyn CaptionSource>,
    metadata: Arc<dyn MetadataProvider>,
    surface: Arc<dyn PresentationSurface>,
    backend: Arc<dyn AskBackend>,
    buffer: Arc<Mutex<CaptionBuffer>>,
    detector: GestureDetector,
    sequencer: CaptureSequencer,
    clock: EngineClock,
    session: Option<ConversationSession>,
    state: SessionState,
    generation: Arc<AtomicU64>,
    seen_generation: u64,
}

impl SessionController {
    /// Build a controller over the given host bindings and ask backend
    pub fn new(settings: Settings, host: HostBindings, backend: Arc<dyn AskBackend>) -> Self {
        let clock = EngineClock::new();
        let buffer = Arc::new(Mutex::new(CaptionBuffer::new(settings.retention_ms())));
        let sequencer = CaptureSequencer::new(
            host.source.clone(),
            host.playback,
            buffer.clone(),
            settings.transcript_limits(),
            clock,
        );
        let detector = GestureDetector::new(settings.activate_shortcut());

        Self {
            source: host.source,
            metadata: host.metadata,
            surface: host.surface,
            backend,
            buffer,
            detector,
            sequencer,
            clock,
            session: None,
            state: SessionState::Idle,
            generation: Arc::new(AtomicU64::new(0)),
            seen_generation: 0,
            settings,
        }
    }

    /// Build a controller backed by the HTTP ask client configured in the
    /// settings
    pub fn with_http_backend(settings: Settings, host: HostBindings) -> anyhow::Result<Self> {
        settings.validate()?;
        let backend = Arc::new(HttpAskClient::new(
            settings.service.ask_url.clone(),
            settings.request_timeout(),
        )?);
        Ok(Self::new(settings, host, backend))
    }

    /// Start the always-running background caption sampler feeding this
    /// controller's buffer
    pub fn start_sampler(&self) -> SamplerHandle {
        spawn_sampler(
            self.source.clone(),
            self.buffer.clone(),
            self.clock,
            self.settings.caption.polling_interval_ms,
        )
    }

    /// Feed a key-down event through the gesture detector.
    ///
    /// When the returned disposition carries a trigger, the host should
    /// follow up with [`SessionController::activate`].
    pub fn on_key_down(&mut self, event: &KeyEvent) -> KeyDisposition {
        let now_ms = self.clock.now_ms();
        self.detector.on_key_down(event, now_ms)
    }

    /// Feed a key-up event through the gesture detector
    pub fn on_key_up(&mut self, event: &KeyEvent) -> KeyDisposition {
        self.detector.on_key_up(event)
    }

    /// Run one activation: capture a transcript, issue the initial request
    /// and open (or refresh) the conversation session.
    ///
    /// Ignored while a capture or a request is already in flight.
    pub async fn activate(&mut self, kind: TriggerKind) {
        self.sync_dismissal();
        if matches!(
            self.state,
            SessionState::Capturing
                | SessionState::AwaitingInitialReply
                | SessionState::AwaitingFollowupReply
        ) {
            debug!(?kind, state = ?self.state, "trigger ignored while busy");
            return;
        }

        info!(?kind, "capture triggered");
        self.state = SessionState::Capturing;
        let captured = self.sequencer.capture().await;

        let meta = self.metadata.metadata();
        let system_prompt = render_initial_prompt(&self.settings.prompts.initial, &meta);
        let request = AskRequest {
            // An empty capture still goes out; the service answers from the
            // page metadata alone.
            transcript: captured.text.clone(),
            system_prompt: system_prompt.clone(),
        };

        self.state = SessionState::AwaitingInitialReply;
        self.surface.show_loading();
        let token = self.generation.load(Ordering::SeqCst);
        let result = self.backend.ask(&request).await;
        self.surface.hide_loading();

        if self.generation.load(Ordering::SeqCst) != token {
            info!("discarding initial reply for dismissed session");
            self.close_internal();
            return;
        }

        let reply_text = match result {
            Ok(reply) => reply.into_display_text(),
            Err(e) => {
                warn!(error = %e, "initial ask request failed");
                format!("[Error: {}]", e)
            }
        };

        // A dismissed overlay has no session left, so retention only ever
        // extends a still-open conversation.
        let retain = self.settings.overlay.retain_history_on_reactivate;
        match self.session.as_mut() {
            Some(session) if retain => {
                session.set_grounding_transcript(captured.text.clone());
            }
            _ => {
                self.session = Some(ConversationSession::new(captured.text.clone()));
            }
        }

        if self.settings.overlay.show_initial_message {
            self.surface.render_banner(&grounding_banner(&system_prompt, &captured));
        }
        if let Some(session) = self.session.as_mut() {
            session.push_assistant(reply_text.clone());
        }
        self.surface.render_assistant_turn(&reply_text);
        self.state = SessionState::Displayed;
    }

    /// Append a user message and issue the follow-up request.
    ///
    /// The user turn is appended and rendered before the network call
    /// (optimistic, independent of the outcome); a failed call appends an
    /// error-marked assistant turn and never rolls the log back. Empty
    /// messages and messages outside an open session are ignored.
    pub async fn send_user_message(&mut self, text: &str) {
        self.sync_dismissal();
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.state != SessionState::Displayed {
            debug!(state = ?self.state, "user message ignored outside an open session");
            return;
        }

        let request = {
            let Some(session) = self.session.as_mut() else {
                warn!("displayed state without a session; dropping message");
                return;
            };
            session.push_user(text);
            AskRequest {
                transcript: session.history_text(),
                // Left empty so the service applies its own follow-up
                // default.
                system_prompt: String::new(),
            }
        };
        self.surface.render_user_turn(text);

        self.state = SessionState::AwaitingFollowupReply;
        self.surface.show_loading();
        let token = self.generation.load(Ordering::SeqCst);
        let result = self.backend.ask(&request).await;
        self.surface.hide_loading();

        if self.generation.load(Ordering::SeqCst) != token {
            info!("discarding follow-up reply for dismissed session");
            self.close_internal();
            return;
        }

        let reply_text = match result {
            Ok(reply) => reply.into_display_text(),
            Err(e) => {
                warn!(error = %e, "follow-up ask request failed");
                format!("[Error: {}]", e)
            }
        };
        if let Some(session) = self.session.as_mut() {
            session.push_assistant(reply_text.clone());
        }
        self.surface.render_assistant_turn(&reply_text);
        self.state = SessionState::Displayed;
    }

    /// Dismiss the overlay: the session and its turns are discarded and any
    /// in-flight reply is marked stale
    pub fn dismiss(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.close_internal();
    }

    /// Handle for the presentation surface's close control
    pub fn dismiss_handle(&self) -> DismissHandle {
        DismissHandle {
            generation: self.generation.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    /// Fold an externally signaled dismissal into controller state
    fn sync_dismissal(&mut self) {
        if self.generation.load(Ordering::SeqCst) != self.seen_generation {
            self.close_internal();
        }
    }

    fn close_internal(&mut self) {
        self.seen_generation = self.generation.load(Ordering::SeqCst);
        if self.state != SessionState::Closed {
            info!("session closed");
        }
        self.state = SessionState::Closed;
        self.session = None;
    }
}

/// Grounding context rendered alongside the first reply
fn grounding_banner(system_prompt: &str, captured: &CapturedTranscript) -> String {
    format!(
        "System prompt: {}\n\nTranscript:\n{}",
        system_prompt, captured.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ask::AskReply;
    use crate::error::AskError;
    use crate::gesture::KeyTarget;
    use crate::page::VideoMetadata;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;

    struct FixedSource(Option<&'static str>);

    impl CaptionSource for FixedSource {
        fn current_fragment(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    struct FakePlayback(AtomicBool);

    impl PlaybackControl for FakePlayback {
        fn is_playing(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn pause(&self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    struct FixedMetadata;

    impl MetadataProvider for FixedMetadata {
        fn metadata(&self) -> VideoMetadata {
            VideoMetadata {
                video_title: "Ferris at sea".to_string(),
                video_description: "Crab documentary".to_string(),
                hashtags: "#crabs".to_string(),
                channel_name: "Oceans".to_string(),
            }
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    enum SurfaceEvent {
        Assistant(String),
        User(String),
        Banner(String),
        LoadingShown,
        LoadingHidden,
    }

    #[derive(Default)]
    struct RecordingSurface(Mutex<Vec<SurfaceEvent>>);

    impl RecordingSurface {
        fn events(&self) -> Vec<SurfaceEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl PresentationSurface for RecordingSurface {
        fn render_assistant_turn(&self, text: &str) {
            self.0
                .lock()
                .unwrap()
                .push(SurfaceEvent::Assistant(text.to_string()));
        }

        fn render_user_turn(&self, text: &str) {
            self.0
                .lock()
                .unwrap()
                .push(SurfaceEvent::User(text.to_string()));
        }

        fn render_banner(&self, text: &str) {
            self.0
                .lock()
                .unwrap()
                .push(SurfaceEvent::Banner(text.to_string()));
        }

        fn show_loading(&self) {
            self.0.lock().unwrap().push(SurfaceEvent::LoadingShown);
        }

        fn hide_loading(&self) {
            self.0.lock().unwrap().push(SurfaceEvent::LoadingHidden);
        }
    }

    /// Scripted backend recording every request it sees
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<AskReply, AskError>>>,
        requests: Mutex<Vec<AskRequest>>,
        dismiss_during_call: Mutex<Option<DismissHandle>>,
    }

    impl ScriptedBackend {
        fn push_response(&self, text: &str) {
            self.replies.lock().unwrap().push_back(Ok(AskReply {
                response: Some(text.to_string()),
                error: None,
            }));
        }

        fn push_error_body(&self, error: &str) {
            self.replies.lock().unwrap().push_back(Ok(AskReply {
                response: None,
                error: Some(error.to_string()),
            }));
        }

        fn push_transport_failure(&self) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(AskError::InvalidResponse(
                    "connection reset".to_string(),
                )));
        }

        fn requests(&self) -> Vec<AskRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AskBackend for ScriptedBackend {
        async fn ask(&self, request: &AskRequest) -> Result<AskReply, AskError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(handle) = self.dismiss_during_call.lock().unwrap().as_ref() {
                handle.dismiss();
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(AskReply::default()))
        }
    }

    struct Harness {
        controller: SessionController,
        backend: Arc<ScriptedBackend>,
        surface: Arc<RecordingSurface>,
    }

    fn harness_with(settings: Settings, fragment: Option<&'static str>) -> Harness {
        let backend = Arc::new(ScriptedBackend::default());
        let surface = Arc::new(RecordingSurface::default());
        let host = HostBindings {
            source: Arc::new(FixedSource(fragment)),
            playback: Arc::new(FakePlayback(AtomicBool::new(true))),
            metadata: Arc::new(FixedMetadata),
            surface: surface.clone(),
        };
        let controller = SessionController::new(settings, host, backend.clone());
        Harness {
            controller,
            backend,
            surface,
        }
    }

    fn harness() -> Harness {
        harness_with(Settings::default(), Some("the tide comes in"))
    }

    fn space_event() -> KeyEvent {
        KeyEvent {
            key: " ".to_string(),
            code: "Space".to_string(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            target: KeyTarget::Page,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_sends_transcript_and_rendered_prompt() {
        let mut h = harness();
        h.backend.push_response("Crabs molt seasonally.");

        h.controller.activate(TriggerKind::DoubleTap).await;

        let requests = h.backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].transcript, "the tide comes in");
        assert!(requests[0].system_prompt.contains("Ferris at sea"));
        assert!(requests[0].system_prompt.contains("Oceans"));
        assert!(!requests[0].system_prompt.contains("{video_title}"));
        assert_eq!(h.controller.state(), SessionState::Displayed);

        let events = h.surface.events();
        assert_eq!(events[0], SurfaceEvent::LoadingShown);
        assert_eq!(events[1], SurfaceEvent::LoadingHidden);
        assert!(matches!(events[2], SurfaceEvent::Banner(_)));
        assert_eq!(
            events[3],
            SurfaceEvent::Assistant("Crabs molt seasonally.".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_carries_grounding_transcript() {
        let mut h = harness();
        h.backend.push_response("ok");
        h.controller.activate(TriggerKind::Chord).await;

        let banner = h
            .surface
            .events()
            .into_iter()
            .find_map(|e| match e {
                SurfaceEvent::Banner(text) => Some(text),
                _ => None,
            })
            .expect("banner rendered");
        assert!(banner.starts_with("System prompt: "));
        assert!(banner.contains("\n\nTranscript:\nthe tide comes in"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_suppressed_by_config() {
        let settings: Settings =
            toml::from_str("[overlay]\nshow_initial_message = false").unwrap();
        let mut h = harness_with(settings, Some("line"));
        h.backend.push_response("ok");

        h.controller.activate(TriggerKind::DoubleTap).await;

        assert!(!h
            .surface
            .events()
            .iter()
            .any(|e| matches!(e, SurfaceEvent::Banner(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_capture_still_sends_request() {
        let mut h = harness_with(Settings::default(), None);
        h.backend.push_response("I can only go by the metadata.");

        h.controller.activate(TriggerKind::DoubleTap).await;

        let requests = h.backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].transcript, "");
        assert_eq!(h.controller.state(), SessionState::Displayed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_sends_history_with_empty_system_prompt() {
        let mut h = harness();
        h.backend.push_response("Initial answer.");
        h.backend.push_response("Follow-up answer.");

        h.controller.activate(TriggerKind::DoubleTap).await;
        h.controller.send_user_message("tell me more").await;

        let requests = h.backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].transcript,
            "Assistant: Initial answer.\n\nYou: tell me more"
        );
        assert_eq!(requests[1].system_prompt, "");

        let session = h.controller.session().expect("session open");
        assert_eq!(session.turns().len(), 3);
        assert_eq!(session.turns()[2].text, "Follow-up answer.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_turn_survives_failed_follow_up() {
        let mut h = harness();
        h.backend.push_response("Initial answer.");
        h.backend.push_transport_failure();

        h.controller.activate(TriggerKind::DoubleTap).await;
        h.controller.send_user_message("still there?").await;

        let session = h.controller.session().expect("session open");
        let texts: Vec<&str> = session.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts[1], "still there?");
        assert!(texts[2].starts_with("[Error: "));
        assert_eq!(h.controller.state(), SessionState::Displayed);

        // The optimistic user render happened before the failure.
        let events = h.surface.events();
        let user_pos = events
            .iter()
            .position(|e| matches!(e, SurfaceEvent::User(_)))
            .unwrap();
        let error_pos = events
            .iter()
            .position(|e| matches!(e, SurfaceEvent::Assistant(t) if t.starts_with("[Error")))
            .unwrap();
        assert!(user_pos < error_pos);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_body_renders_as_error_marked_turn() {
        let mut h = harness();
        h.backend.push_error_body("model overloaded");

        h.controller.activate(TriggerKind::DoubleTap).await;

        let session = h.controller.session().expect("session opens on error too");
        assert_eq!(session.turns()[0].text, "[Error: model overloaded]");
        assert_eq!(h.controller.state(), SessionState::Displayed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_and_out_of_session_messages_ignored() {
        let mut h = harness();
        h.controller.send_user_message("nobody listening").await;
        h.controller.send_user_message("   ").await;
        assert!(h.backend.requests().is_empty());
        assert!(h.surface.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_discards_session() {
        let mut h = harness();
        h.backend.push_response("hello");
        h.controller.activate(TriggerKind::DoubleTap).await;
        assert!(h.controller.session().is_some());

        h.controller.dismiss();
        assert_eq!(h.controller.state(), SessionState::Closed);
        assert!(h.controller.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_dismissal_is_swallowed() {
        let mut h = harness();
        h.backend.push_response("too late");
        // The surface's close control fires while the request is in flight.
        *h.backend.dismiss_during_call.lock().unwrap() =
            Some(h.controller.dismiss_handle());

        h.controller.activate(TriggerKind::DoubleTap).await;

        assert_eq!(h.controller.state(), SessionState::Closed);
        assert!(h.controller.session().is_none());
        assert!(!h
            .surface
            .events()
            .iter()
            .any(|e| matches!(e, SurfaceEvent::Assistant(_) | SurfaceEvent::Banner(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_starts_fresh_session_by_default() {
        let mut h = harness();
        h.backend.push_response("first grounding");
        h.backend.push_response("follow-up");
        h.backend.push_response("second grounding");

        h.controller.activate(TriggerKind::DoubleTap).await;
        h.controller.send_user_message("q").await;
        h.controller.activate(TriggerKind::DoubleTap).await;

        let session = h.controller.session().expect("session open");
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.turns()[0].text, "second grounding");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_retains_history_when_configured() {
        let settings: Settings =
            toml::from_str("[overlay]\nretain_history_on_reactivate = true").unwrap();
        let mut h = harness_with(settings, Some("a caption"));
        h.backend.push_response("first grounding");
        h.backend.push_response("follow-up");
        h.backend.push_response("second grounding");

        h.controller.activate(TriggerKind::DoubleTap).await;
        h.controller.send_user_message("q").await;
        h.controller.activate(TriggerKind::Chord).await;

        let session = h.controller.session().expect("session open");
        let texts: Vec<&str> = session.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["first grounding", "q", "follow-up", "second grounding"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_after_dismiss_reopens_fresh() {
        let settings: Settings =
            toml::from_str("[overlay]\nretain_history_on_reactivate = true").unwrap();
        let mut h = harness_with(settings, Some("a caption"));
        h.backend.push_response("before close");
        h.backend.push_response("after close");

        h.controller.activate(TriggerKind::DoubleTap).await;
        h.controller.dismiss();
        h.controller.activate(TriggerKind::DoubleTap).await;

        // Even with retention configured, dismissal discarded the turns.
        let session = h.controller.session().expect("session open");
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.turns()[0].text, "after close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_events_flow_through_detector() {
        let mut h = harness();
        let first = h.controller.on_key_down(&space_event());
        assert_eq!(first.trigger, None);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let second = h.controller.on_key_down(&space_event());
        assert_eq!(second.trigger, Some(TriggerKind::DoubleTap));
        assert!(h.controller.on_key_up(&space_event()).inhibit_default);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grounding_transcript_recorded_on_session() {
        let mut h = harness();
        h.backend.push_response("ok");
        h.controller.activate(TriggerKind::DoubleTap).await;
        assert_eq!(
            h.controller.session().unwrap().grounding_transcript(),
            "the tide comes in"
        );
    }
}
