//! `Coordinator` — root of the guidance core.
//!
//! ## Inbound entry points
//!
//! ```text
//! vision loop ──► on_detection_batch ──► ProximityAnalyzer (Guide + cycle cooldown)
//! recognizer  ──► on_command_transcript ─► CommandParser ─► ModeMachine
//! UI          ──► on_manual_toggle ──────────────────────────┘
//! UI / cmd    ──► capture_and_extract ─► VideoSource + TextExtractor (timeout)
//!                                  │
//!                    every utterance ─► mode gate ─► debounce ─► SpeechSlot
//! ```
//!
//! ## Locking
//!
//! Mode, rate-limiter timestamps, the previous batch and the UI read model
//! live together in one `parking_lot::Mutex<CoordinatorState>`. The lock is
//! never held across an `.await`; the extraction request runs in
//! `spawn_blocking` with only cloned handles.

pub mod diagnostics;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    analyzer::{CenterPolicy, ProximityAnalyzer, DEFAULT_GROWTH_FACTOR},
    capture::VideoSourceHandle,
    detection::{Detection, DetectionBatch},
    error::{Result, SensaiError},
    extraction::ExtractorHandle,
    ipc::events::{GuidanceCue, GuidanceEvent, SpeechEvent, StatusEvent, StatusReason, UiSnapshot},
    mode::{Command, CommandParser, ManualToggle, Mode, ModeMachine, DEFAULT_WAKE_PHRASE},
    rate_limit::{RateLimiter, DEFAULT_CYCLE_COOLDOWN, DEFAULT_UTTERANCE_DEBOUNCE},
    speech::{SpeechSlot, Utterance, DEFAULT_SPEECH_LANG},
};

pub use diagnostics::{CoordinatorDiagnostics, DiagnosticsSnapshot};

/// Broadcast channel capacity per event stream.
const BROADCAST_CAP: usize = 256;

/// Spoken when a capture request fails for any reason.
pub const EXTRACTION_ERROR_UTTERANCE: &str = "Sorry, I could not read any text.";

const UNRECOGNIZED_NOTIFICATION: &str = "Command not recognized.";

/// Configuration for `Coordinator`.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Phrase that must precede every voice command. Default: `"ok sensei"`.
    pub wake_phrase: String,
    /// Area ratio above which a matched object counts as approaching.
    /// Default: 1.10.
    pub growth_factor: f32,
    /// Off-center policy. Default: full-center with zero margin.
    pub center_policy: CenterPolicy,
    /// Detections scoring below this are discarded. Default: 0.5.
    pub min_detection_score: f32,
    /// Minimum time between accepted analysis cycles. Default: 3 s.
    pub cycle_cooldown: Duration,
    /// Minimum time between forwarded utterances. Default: 1 s.
    pub utterance_debounce: Duration,
    /// Upper bound for one capture-and-extract request. Default: 5 s.
    pub extraction_timeout: Duration,
    /// How long a transient notification stays visible. Default: 3 s.
    pub notification_ttl: Duration,
    /// BCP-47 language tag passed to the speech actuator. Default: `"en-US"`.
    pub speech_lang: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            wake_phrase: DEFAULT_WAKE_PHRASE.into(),
            growth_factor: DEFAULT_GROWTH_FACTOR,
            center_policy: CenterPolicy::default(),
            min_detection_score: 0.5,
            cycle_cooldown: DEFAULT_CYCLE_COOLDOWN,
            utterance_debounce: DEFAULT_UTTERANCE_DEBOUNCE,
            extraction_timeout: Duration::from_secs(5),
            notification_ttl: Duration::from_secs(3),
            speech_lang: DEFAULT_SPEECH_LANG.into(),
        }
    }
}

/// Mutable state guarded by the coordinator's single lock.
struct CoordinatorState {
    modes: ModeMachine,
    limiter: RateLimiter,
    /// Empty on the first frame, otherwise the immediately preceding
    /// non-empty batch.
    previous: Option<DetectionBatch>,
    latest_detections: Vec<Detection>,
    notification: Option<(String, Instant)>,
    last_error: Option<String>,
    last_captured_text: Option<String>,
    extracting: bool,
}

pub struct Coordinator {
    config: CoordinatorConfig,
    parser: CommandParser,
    analyzer: ProximityAnalyzer,
    state: Mutex<CoordinatorState>,
    /// `None` when the actuator reported itself unsupported at startup.
    speech: Option<SpeechSlot>,
    video: VideoSourceHandle,
    extractor: ExtractorHandle,
    status_tx: broadcast::Sender<StatusEvent>,
    speech_tx: broadcast::Sender<SpeechEvent>,
    guidance_tx: broadcast::Sender<GuidanceEvent>,
    /// Monotonically increasing event sequence counter.
    seq: AtomicU64,
    diagnostics: CoordinatorDiagnostics,
}

impl Coordinator {
    /// Build a coordinator. Probes speech support once; an unsupported
    /// actuator disables the spoken path for the whole session.
    pub fn new(
        config: CoordinatorConfig,
        speech: SpeechSlot,
        video: VideoSourceHandle,
        extractor: ExtractorHandle,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (speech_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (guidance_tx, _) = broadcast::channel(BROADCAST_CAP);

        let mut notification = None;
        let speech = if speech.is_supported() {
            Some(speech)
        } else {
            let err = SensaiError::ActuatorUnsupported;
            warn!("{err} — spoken feedback disabled");
            notification = Some((err.user_message(), Instant::now()));
            None
        };

        info!(
            wake_phrase = %config.wake_phrase,
            growth_factor = config.growth_factor,
            center_policy = ?config.center_policy,
            cycle_cooldown_ms = config.cycle_cooldown.as_millis() as u64,
            utterance_debounce_ms = config.utterance_debounce.as_millis() as u64,
            speech_enabled = speech.is_some(),
            "coordinator created"
        );

        Self {
            parser: CommandParser::new(&config.wake_phrase),
            analyzer: ProximityAnalyzer::new(config.growth_factor, config.center_policy),
            state: Mutex::new(CoordinatorState {
                modes: ModeMachine::new(),
                limiter: RateLimiter::new(config.cycle_cooldown, config.utterance_debounce),
                previous: None,
                latest_detections: Vec::new(),
                notification,
                last_error: None,
                last_captured_text: None,
                extracting: false,
            }),
            config,
            speech,
            video,
            extractor,
            status_tx,
            speech_tx,
            guidance_tx,
            seq: AtomicU64::new(0),
            diagnostics: CoordinatorDiagnostics::default(),
        }
    }

    // ── Entry points ─────────────────────────────────────────────────────────

    /// Consume one detection batch from the vision loop.
    ///
    /// Never blocks on a previous cycle: batches arriving inside the cycle
    /// cooldown only refresh the previous-batch reference.
    pub fn on_detection_batch(&self, batch: DetectionBatch) {
        CoordinatorDiagnostics::bump(&self.diagnostics.batches_in);
        let batch = batch.retain_confident(self.config.min_detection_score);
        let now = Instant::now();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.latest_detections = batch.detections.clone();
        self.emit_status(state, StatusReason::Detections);

        if batch.is_empty() {
            return;
        }

        let mut signals = Vec::new();
        if state.modes.mode() == Mode::Guide {
            if let Some(previous) = state.previous.as_ref() {
                if state.limiter.try_begin_cycle(now) {
                    CoordinatorDiagnostics::bump(&self.diagnostics.cycles_accepted);
                    let span = info_span!("guidance_cycle", detections = batch.detections.len());
                    let _enter = span.enter();
                    signals = self.analyzer.analyze(&batch, previous);
                    debug!(signals = signals.len(), "cycle analysed");
                } else {
                    CoordinatorDiagnostics::bump(&self.diagnostics.cycles_skipped);
                }
            }
        }
        state.previous = Some(batch);

        if signals.is_empty() {
            return;
        }
        self.diagnostics
            .signals_derived
            .fetch_add(signals.len(), Ordering::Relaxed);

        let mut cues = Vec::with_capacity(signals.len());
        for signal in &signals {
            let text = signal.utterance_text();
            self.offer_utterance(state, Utterance::guidance(text.clone()), now);
            cues.push(GuidanceCue {
                class: signal.class.clone(),
                kind: signal.kind,
                utterance: text,
            });
        }
        drop(guard);

        let _ = self.guidance_tx.send(GuidanceEvent {
            seq: self.next_seq(),
            cues,
        });
    }

    /// Consume one transcript from the recognizer.
    ///
    /// Returns the parsed command, or `None` if the wake phrase was absent
    /// (in which case nothing else happens).
    pub async fn on_command_transcript(&self, transcript: &str) -> Option<Command> {
        let Some(command) = self.parser.parse(transcript) else {
            CoordinatorDiagnostics::bump(&self.diagnostics.commands_ignored);
            debug!(transcript, "no wake phrase — transcript ignored");
            return None;
        };
        CoordinatorDiagnostics::bump(&self.diagnostics.commands_parsed);
        info!(?command, "voice command");
        self.apply_command(command).await;
        Some(command)
    }

    /// UI-triggered equivalent of a voice command; no wake phrase needed.
    pub async fn on_manual_toggle(&self, toggle: ManualToggle) {
        info!(?toggle, "manual toggle");
        self.apply_command(toggle.command()).await;
    }

    /// Capture one frame, extract its text and speak the result.
    ///
    /// Bounded by `extraction_timeout`; expiry counts as an extraction
    /// failure. Failures are spoken and surfaced as `last_error` but never
    /// touch the mode.
    ///
    /// # Errors
    /// - `SensaiError::CaptureInProgress` if a request is already running
    ///   (no frame is requested).
    /// - `SensaiError::CaptureUnavailable` / `SensaiError::ExtractionFailed`
    ///   for the request itself.
    pub async fn capture_and_extract(&self) -> Result<String> {
        {
            let mut state = self.state.lock();
            if state.extracting {
                let err = SensaiError::CaptureInProgress;
                self.set_notification(&mut state, err.user_message());
                return Err(err);
            }
            state.extracting = true;
            state.last_error = None;
            self.emit_status(&state, StatusReason::ExtractionStarted);
        }
        CoordinatorDiagnostics::bump(&self.diagnostics.captures_started);

        let seq = self.seq.load(Ordering::Relaxed);
        let result = self
            .run_extraction()
            .instrument(info_span!("capture", seq))
            .await;

        let now = Instant::now();
        let mut state = self.state.lock();
        state.extracting = false;
        match result {
            Ok(text) => {
                info!(chars = text.len(), "text extracted");
                state.last_captured_text = Some(text.clone());
                self.emit_status(&state, StatusReason::ExtractionFinished);
                self.offer_utterance(&mut state, Utterance::extraction(text.clone()), now);
                Ok(text)
            }
            Err(err) => {
                CoordinatorDiagnostics::bump(&self.diagnostics.captures_failed);
                warn!(error = %err, "capture and extract failed");
                state.last_error = Some(err.user_message());
                self.emit_status(&state, StatusReason::ExtractionFailed);
                self.offer_utterance(
                    &mut state,
                    Utterance::extraction(EXTRACTION_ERROR_UTTERANCE),
                    now,
                );
                Err(err)
            }
        }
    }

    /// Surface a transient notification to the UI (e.g. recognizer stopped).
    pub fn notify(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        self.set_notification(&mut state, message.into());
    }

    // ── Read side ────────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.state.lock().modes.mode()
    }

    /// Current UI read model. Expired notifications are omitted.
    pub fn snapshot(&self) -> UiSnapshot {
        let state = self.state.lock();
        self.snapshot_locked(&state)
    }

    pub fn speech_enabled(&self) -> bool {
        self.speech.is_some()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_speech(&self) -> broadcast::Receiver<SpeechEvent> {
        self.speech_tx.subscribe()
    }

    pub fn subscribe_guidance(&self) -> broadcast::Receiver<GuidanceEvent> {
        self.guidance_tx.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    async fn apply_command(&self, command: Command) {
        let now = Instant::now();

        if command == Command::FlipCamera {
            let facing = self.video.0.lock().flip_camera();
            debug!(?facing, "camera flip forwarded to video source");
        }

        {
            let mut state = self.state.lock();
            let transition = state.modes.apply(command);
            if transition.changed() {
                info!(from = ?transition.from, to = ?transition.to, "mode changed");
                self.emit_status(&state, StatusReason::ModeChanged);
            }

            match command {
                Command::Unrecognized => {
                    CoordinatorDiagnostics::bump(&self.diagnostics.commands_unrecognized);
                    self.set_notification(&mut state, UNRECOGNIZED_NOTIFICATION.into());
                }
                Command::FlipCamera => self.emit_status(&state, StatusReason::CameraFlipped),
                Command::SwitchToCapture | Command::SwitchToGuide => {}
            }

            if let Some(text) = command.confirmation() {
                let utterance = Utterance::confirmation(text, command.confirmation_requires());
                self.offer_utterance(&mut state, utterance, now);
            }
        }

        if command == Command::SwitchToCapture {
            // Failures are already spoken and surfaced by capture_and_extract.
            let _ = self.capture_and_extract().await;
        }
    }

    async fn run_extraction(&self) -> Result<String> {
        let video = self.video.clone();
        let extractor = self.extractor.clone();
        let task = tokio::task::spawn_blocking(move || {
            let frame = video.0.lock().capture_frame()?;
            if frame.is_empty() {
                return Err(SensaiError::CaptureUnavailable);
            }
            debug!(width = frame.width, height = frame.height, "frame captured");
            extractor.0.lock().extract(&frame)
        });

        match tokio::time::timeout(self.config.extraction_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(SensaiError::ExtractionFailed(format!(
                "extraction task died: {join_err}"
            ))),
            Err(_) => Err(SensaiError::ExtractionFailed(format!(
                "timed out after {} ms",
                self.config.extraction_timeout.as_millis()
            ))),
        }
    }

    /// Mode gate → debounce → single-slot submit. Returns whether the
    /// utterance reached the actuator.
    fn offer_utterance(&self, state: &mut CoordinatorState, utterance: Utterance, now: Instant) -> bool {
        if !utterance.allowed_in(state.modes.mode()) {
            CoordinatorDiagnostics::bump(&self.diagnostics.utterances_mode_gated);
            debug!(text = %utterance.text, "utterance gated by mode");
            return false;
        }
        let Some(speech) = self.speech.as_ref() else {
            return false;
        };
        if !state.limiter.try_accept_utterance(now) {
            CoordinatorDiagnostics::bump(&self.diagnostics.utterances_debounced);
            debug!(text = %utterance.text, "utterance dropped by debounce");
            return false;
        }

        CoordinatorDiagnostics::bump(&self.diagnostics.utterances_forwarded);
        if let Err(e) = speech.submit(&utterance) {
            warn!(error = %e, "speech submit failed");
        }
        info!(text = %utterance.text, priority = ?utterance.priority, "utterance forwarded");
        let _ = self.speech_tx.send(SpeechEvent {
            seq: self.next_seq(),
            text: utterance.text,
            priority: utterance.priority,
        });
        true
    }

    fn set_notification(&self, state: &mut CoordinatorState, message: String) {
        info!(notification = %message, "notification");
        state.notification = Some((message, Instant::now()));
        self.emit_status(state, StatusReason::Notification);
    }

    fn snapshot_locked(&self, state: &CoordinatorState) -> UiSnapshot {
        let notification = state
            .notification
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.config.notification_ttl)
            .map(|(message, _)| message.clone());

        UiSnapshot {
            mode: state.modes.mode(),
            notification,
            last_error: state.last_error.clone(),
            last_captured_text: state.last_captured_text.clone(),
            detections: state.latest_detections.clone(),
            extracting: state.extracting,
        }
    }

    fn emit_status(&self, state: &CoordinatorState, reason: StatusReason) {
        let _ = self.status_tx.send(StatusEvent {
            seq: self.next_seq(),
            reason,
            snapshot: self.snapshot_locked(state),
        });
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::capture::stub::StillFrameSource;
    use crate::detection::BoundingBox;
    use crate::extraction::{stub::FixedTextRecognizer, TwoStageExtractor};
    use crate::speech::SpeechActuator;

    #[derive(Clone, Default)]
    struct Spoken(Arc<Mutex<Vec<String>>>);

    impl SpeechActuator for Spoken {
        fn speak(&mut self, text: &str, _lang: &str) -> Result<()> {
            self.0.lock().push(text.to_string());
            Ok(())
        }

        fn cancel(&mut self) {}
    }

    struct Mute;

    impl SpeechActuator for Mute {
        fn is_supported(&self) -> bool {
            false
        }

        fn speak(&mut self, _text: &str, _lang: &str) -> Result<()> {
            panic!("unsupported actuator must never be called");
        }

        fn cancel(&mut self) {}
    }

    fn coordinator_with(spoken: &Spoken) -> Coordinator {
        Coordinator::new(
            CoordinatorConfig::default(),
            SpeechSlot::new(spoken.clone(), DEFAULT_SPEECH_LANG),
            VideoSourceHandle::new(StillFrameSource::new(640, 480)),
            ExtractorHandle::new(TwoStageExtractor::new(FixedTextRecognizer::new("EXIT"))),
        )
    }

    fn bottle(w: f32) -> DetectionBatch {
        DetectionBatch::new(
            vec![Detection::new("bottle", BoundingBox::new(300.0, 10.0, w, w), 0.9)],
            640,
            480,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_batch_only_seeds_previous() {
        let spoken = Spoken::default();
        let c = coordinator_with(&spoken);
        c.on_detection_batch(bottle(50.0));
        assert!(spoken.0.lock().is_empty());
        assert_eq!(c.diagnostics_snapshot().cycles_accepted, 0);
        assert_eq!(c.snapshot().detections.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn low_score_detections_are_discarded() {
        let spoken = Spoken::default();
        let c = coordinator_with(&spoken);
        let weak = DetectionBatch::new(
            vec![Detection::new("cat", BoundingBox::new(0.0, 0.0, 5.0, 5.0), 0.1)],
            640,
            480,
        );
        c.on_detection_batch(weak);
        assert!(c.snapshot().detections.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_actuator_disables_speech_and_notifies() {
        let c = Coordinator::new(
            CoordinatorConfig::default(),
            SpeechSlot::new(Mute, DEFAULT_SPEECH_LANG),
            VideoSourceHandle::new(StillFrameSource::new(640, 480)),
            ExtractorHandle::new(TwoStageExtractor::new(FixedTextRecognizer::new("EXIT"))),
        );
        assert!(!c.speech_enabled());
        assert!(c.snapshot().notification.is_some());

        c.on_command_transcript("ok sensei switch to guide").await;
        c.on_detection_batch(bottle(50.0));
        tokio::time::advance(Duration::from_secs(4)).await;
        c.on_detection_batch(bottle(80.0));
        assert_eq!(c.diagnostics_snapshot().utterances_forwarded, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn notifications_expire_after_ttl() {
        let spoken = Spoken::default();
        let c = coordinator_with(&spoken);
        c.notify("Voice commands stopped");
        assert_eq!(c.snapshot().notification.as_deref(), Some("Voice commands stopped"));
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(c.snapshot().notification, None);
    }

    #[tokio::test(start_paused = true)]
    async fn flip_camera_reaches_video_source() {
        let spoken = Spoken::default();
        let video = VideoSourceHandle::new(StillFrameSource::new(640, 480));
        let c = Coordinator::new(
            CoordinatorConfig::default(),
            SpeechSlot::new(spoken.clone(), DEFAULT_SPEECH_LANG),
            video.clone(),
            ExtractorHandle::new(TwoStageExtractor::new(FixedTextRecognizer::new("EXIT"))),
        );
        c.on_command_transcript("ok sensei flip the camera").await;
        assert_eq!(video.0.lock().facing(), crate::capture::CameraFacing::User);
        assert_eq!(*spoken.0.lock(), vec!["Camera flipped."]);
        assert_eq!(c.mode(), Mode::Guide);
    }
}
