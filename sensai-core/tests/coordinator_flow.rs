use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::TryRecvError;

use sensai_core::capture::stub::StillFrameSource;
use sensai_core::coordinator::EXTRACTION_ERROR_UTTERANCE;
use sensai_core::extraction::stub::FixedTextRecognizer;
use sensai_core::ipc::events::StatusReason;
use sensai_core::speech::DEFAULT_SPEECH_LANG;
use sensai_core::{
    BoundingBox, CameraFacing, Command, Coordinator, CoordinatorConfig, Detection,
    DetectionBatch, ExtractorHandle, Frame, ManualToggle, Mode, SensaiError, SignalKind,
    SpeechActuator, SpeechSlot, TextExtractor, TwoStageExtractor, VideoSource,
    VideoSourceHandle,
};

/// Records every utterance handed to the actuator.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn spoken(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl SpeechActuator for Recorder {
    fn speak(&mut self, text: &str, _lang: &str) -> sensai_core::error::Result<()> {
        self.0.lock().push(text.to_string());
        Ok(())
    }

    fn cancel(&mut self) {}
}

/// Counts frame requests reaching the camera.
struct CountingSource {
    inner: StillFrameSource,
    requests: Arc<AtomicUsize>,
}

impl CountingSource {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let requests = Arc::new(AtomicUsize::new(0));
        let source = Self {
            inner: StillFrameSource::new(640, 480),
            requests: Arc::clone(&requests),
        };
        (source, requests)
    }
}

impl VideoSource for CountingSource {
    fn capture_frame(&mut self) -> sensai_core::error::Result<Frame> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.capture_frame()
    }

    fn flip_camera(&mut self) -> CameraFacing {
        self.inner.flip_camera()
    }

    fn facing(&self) -> CameraFacing {
        self.inner.facing()
    }
}

struct SlowExtractor {
    delay: Duration,
}

impl TextExtractor for SlowExtractor {
    fn extract(&mut self, _frame: &Frame) -> sensai_core::error::Result<String> {
        thread::sleep(self.delay);
        Ok("SLOW".into())
    }
}

fn build(config: CoordinatorConfig, recorder: &Recorder, video: impl VideoSource) -> Coordinator {
    Coordinator::new(
        config,
        SpeechSlot::new(recorder.clone(), DEFAULT_SPEECH_LANG),
        VideoSourceHandle::new(video),
        ExtractorHandle::new(TwoStageExtractor::new(FixedTextRecognizer::new(
            "  EXIT \n ~~ \n  Floor   2 ",
        ))),
    )
}

fn no_debounce() -> CoordinatorConfig {
    CoordinatorConfig {
        utterance_debounce: Duration::ZERO,
        ..CoordinatorConfig::default()
    }
}

fn batch(class: &str, bbox: BoundingBox) -> DetectionBatch {
    DetectionBatch::new(vec![Detection::new(class, bbox, 0.9)], 640, 480)
}

/// Square box whose center sits exactly on the frame center (x = 320).
fn centered(class: &str, side: f32) -> DetectionBatch {
    batch(class, BoundingBox::new(320.0 - side / 2.0, 100.0, side, side))
}

// ── Guide mode ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn growing_bottle_is_announced_once_per_debounce_window() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));
    let mut guidance_rx = c.subscribe_guidance();

    c.on_detection_batch(batch("bottle", BoundingBox::new(10.0, 10.0, 50.0, 50.0)));
    c.on_detection_batch(batch("bottle", BoundingBox::new(10.0, 10.0, 60.0, 60.0)));

    let event = guidance_rx.try_recv().expect("guidance event");
    let kinds: Vec<SignalKind> = event.cues.iter().map(|cue| cue.kind).collect();
    assert_eq!(kinds, vec![SignalKind::Approaching, SignalKind::OffCenterLeft]);
    assert_eq!(event.cues[1].utterance, "Move to the left!");

    // Both signals share one instant, so only the first reaches the speaker.
    assert_eq!(recorder.spoken(), vec!["bottle is approaching!"]);
    assert_eq!(c.diagnostics_snapshot().utterances_debounced, 1);
}

#[tokio::test(start_paused = true)]
async fn cooldown_skips_cycles_but_refreshes_previous_batch() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));

    c.on_detection_batch(centered("chair", 50.0));
    c.on_detection_batch(centered("chair", 60.0));
    assert_eq!(recorder.spoken(), vec!["chair is approaching!"]);

    tokio::time::advance(Duration::from_secs(1)).await;
    c.on_detection_batch(centered("chair", 80.0));
    tokio::time::advance(Duration::from_secs(1)).await;
    c.on_detection_batch(centered("chair", 100.0));

    // Cooldown over. Compared with the 100px batch there is no growth, even
    // though the box is far larger than the one from the last analysed cycle.
    tokio::time::advance(Duration::from_secs(1)).await;
    c.on_detection_batch(centered("chair", 100.0));

    let diag = c.diagnostics_snapshot();
    assert_eq!(diag.cycles_accepted, 2);
    assert_eq!(diag.cycles_skipped, 2);
    assert_eq!(recorder.spoken().len(), 1);

    tokio::time::advance(Duration::from_secs(3)).await;
    c.on_detection_batch(centered("chair", 120.0));
    assert_eq!(recorder.spoken().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_batches_keep_the_previous_reference() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));

    c.on_detection_batch(centered("person", 50.0));
    c.on_detection_batch(DetectionBatch::new(Vec::new(), 640, 480));
    assert!(c.snapshot().detections.is_empty());

    c.on_detection_batch(centered("person", 70.0));
    assert_eq!(recorder.spoken(), vec!["person is approaching!"]);
}

#[tokio::test(start_paused = true)]
async fn unmatched_classes_emit_nothing() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));

    c.on_detection_batch(batch("cup", BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
    c.on_detection_batch(batch("dog", BoundingBox::new(0.0, 0.0, 90.0, 90.0)));

    assert!(recorder.spoken().is_empty());
    assert_eq!(c.diagnostics_snapshot().signals_derived, 0);
}

// ── Commands ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn transcripts_without_wake_phrase_change_nothing() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));
    let mut status_rx = c.subscribe_status();

    assert_eq!(c.on_command_transcript("switch to capture").await, None);
    assert_eq!(c.mode(), Mode::Guide);
    assert!(recorder.spoken().is_empty());
    assert!(matches!(status_rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(c.diagnostics_snapshot().commands_ignored, 1);
}

#[tokio::test(start_paused = true)]
async fn wake_phrase_must_be_whole_words() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));

    assert_eq!(c.on_command_transcript("look sensei switch to capture").await, None);
    assert_eq!(c.on_command_transcript("took sensei switch to capture").await, None);

    assert_eq!(c.mode(), Mode::Guide);
    assert!(recorder.spoken().is_empty());
    assert_eq!(c.diagnostics_snapshot().commands_ignored, 2);
}

#[tokio::test(start_paused = true)]
async fn unrecognized_command_surfaces_a_notification() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));

    let command = c.on_command_transcript("ok sensei make me a sandwich").await;
    assert_eq!(command, Some(Command::Unrecognized));
    assert_eq!(c.mode(), Mode::Guide);
    assert_eq!(c.snapshot().notification.as_deref(), Some("Command not recognized."));
    assert!(recorder.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn switching_to_guide_while_in_guide_is_idempotent() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));
    let mut status_rx = c.subscribe_status();

    c.on_command_transcript("ok sensei switch to guide").await;

    assert_eq!(c.mode(), Mode::Guide);
    assert_eq!(recorder.spoken(), vec!["Guide mode activated."]);
    assert!(matches!(status_rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn switch_to_capture_speaks_confirmation_and_extracts_text() {
    let recorder = Recorder::default();
    let (video, frame_requests) = CountingSource::new();
    let c = build(no_debounce(), &recorder, video);
    let mut status_rx = c.subscribe_status();

    let command = c.on_command_transcript("OK Sensei, switch to capture").await;
    assert_eq!(frame_requests.load(Ordering::SeqCst), 1);

    assert_eq!(command, Some(Command::SwitchToCapture));
    assert_eq!(c.mode(), Mode::Capture);
    assert_eq!(
        recorder.spoken(),
        vec!["Capture mode activated.", "EXIT\nFloor 2"]
    );

    let snapshot = c.snapshot();
    assert_eq!(snapshot.last_captured_text.as_deref(), Some("EXIT\nFloor 2"));
    assert!(!snapshot.extracting);
    assert_eq!(snapshot.last_error, None);

    let reasons: Vec<StatusReason> = std::iter::from_fn(|| status_rx.try_recv().ok())
        .map(|event| event.reason)
        .collect();
    assert_eq!(
        reasons,
        vec![
            StatusReason::ModeChanged,
            StatusReason::ExtractionStarted,
            StatusReason::ExtractionFinished,
        ]
    );
}

#[tokio::test]
async fn default_debounce_drops_the_result_spoken_right_after_confirmation() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));

    c.on_command_transcript("ok sensei switch to capture").await;

    assert_eq!(recorder.spoken(), vec!["Capture mode activated."]);
    assert_eq!(c.snapshot().last_captured_text.as_deref(), Some("EXIT\nFloor 2"));
}

#[tokio::test]
async fn capture_failure_is_spoken_and_keeps_the_mode() {
    let recorder = Recorder::default();
    let c = build(no_debounce(), &recorder, StillFrameSource::unavailable());

    c.on_manual_toggle(ManualToggle::AlertsOff).await;

    assert_eq!(c.mode(), Mode::Capture);
    assert_eq!(
        recorder.spoken(),
        vec!["Capture mode activated.", EXTRACTION_ERROR_UTTERANCE]
    );
    let snapshot = c.snapshot();
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Failed to capture image from the webcam")
    );
    assert_eq!(snapshot.last_captured_text, None);
    assert_eq!(c.diagnostics_snapshot().captures_failed, 1);
}

#[tokio::test]
async fn slow_extraction_times_out() {
    let recorder = Recorder::default();
    let config = CoordinatorConfig {
        extraction_timeout: Duration::from_millis(50),
        ..no_debounce()
    };
    let c = Coordinator::new(
        config,
        SpeechSlot::new(recorder.clone(), DEFAULT_SPEECH_LANG),
        VideoSourceHandle::new(StillFrameSource::new(640, 480)),
        ExtractorHandle::new(SlowExtractor {
            delay: Duration::from_millis(300),
        }),
    );

    let result = c.capture_and_extract().await;

    assert!(matches!(result, Err(SensaiError::ExtractionFailed(_))));
    assert_eq!(
        c.snapshot().last_error.as_deref(),
        Some("Failed to read text from the image")
    );
    assert_eq!(recorder.spoken(), vec![EXTRACTION_ERROR_UTTERANCE]);
    assert!(!c.snapshot().extracting);
}

#[tokio::test]
async fn concurrent_capture_is_rejected() {
    let recorder = Recorder::default();
    let (video, frame_requests) = CountingSource::new();
    let c = Arc::new(Coordinator::new(
        no_debounce(),
        SpeechSlot::new(recorder.clone(), DEFAULT_SPEECH_LANG),
        VideoSourceHandle::new(video),
        ExtractorHandle::new(SlowExtractor {
            delay: Duration::from_millis(150),
        }),
    ));

    let first = {
        let c = Arc::clone(&c);
        tokio::spawn(async move { c.capture_and_extract().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(c.snapshot().extracting);
    assert_eq!(frame_requests.load(Ordering::SeqCst), 1);

    let second = c.capture_and_extract().await;
    assert!(matches!(second, Err(SensaiError::CaptureInProgress)));
    // The rejected request never reaches the camera.
    assert_eq!(frame_requests.load(Ordering::SeqCst), 1);
    assert_eq!(
        c.snapshot().notification.as_deref(),
        Some("Text capture already in progress")
    );

    let first = first.await.expect("capture task");
    assert_eq!(first.expect("first capture succeeds"), "SLOW");
    assert_eq!(c.diagnostics_snapshot().captures_started, 1);
}

// ── Mode gating ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn capture_mode_suppresses_guidance() {
    let recorder = Recorder::default();
    let c = build(CoordinatorConfig::default(), &recorder, StillFrameSource::new(640, 480));
    let mut guidance_rx = c.subscribe_guidance();

    // Manual toggles skip the wake phrase but not the capture request.
    c.on_manual_toggle(ManualToggle::AlertsOff).await;
    assert_eq!(c.mode(), Mode::Capture);
    let spoken_before = recorder.spoken().len();

    c.on_detection_batch(batch("car", BoundingBox::new(0.0, 0.0, 40.0, 40.0)));
    tokio::time::advance(Duration::from_secs(5)).await;
    c.on_detection_batch(batch("car", BoundingBox::new(0.0, 0.0, 90.0, 90.0)));

    assert!(matches!(guidance_rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(recorder.spoken().len(), spoken_before);
    assert_eq!(c.diagnostics_snapshot().cycles_accepted, 0);

    // Back in Guide, the batch seen during Capture is the comparison base.
    c.on_manual_toggle(ManualToggle::AlertsOn).await;
    tokio::time::advance(Duration::from_secs(5)).await;
    c.on_detection_batch(batch("car", BoundingBox::new(0.0, 0.0, 120.0, 120.0)));
    let event = guidance_rx.try_recv().expect("guidance after returning to guide");
    assert_eq!(event.cues[0].kind, SignalKind::Approaching);
}
