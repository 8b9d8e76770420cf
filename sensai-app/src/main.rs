//! SensAI headless host.
//!
//! Wires `sensai-core` to console-driven adapters: stdin lines become
//! transcripts or manual controls, speech is printed at a word pace, and
//! coordinator events are printed as JSON lines.
//!
//! The Tokio runtime is built by hand after the remote cleanup client, because
//! `reqwest::blocking` clients must not be created inside an async context.

mod commands;
mod console;
mod settings;
mod state;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use sensai_core::capture::stub::StillFrameSource;
use sensai_core::detection::stub::ScriptedDetector;
use sensai_core::extraction::stub::FixedTextRecognizer;
use sensai_core::speech::console::ConsoleActuator;
use sensai_core::{
    BoundingBox, Coordinator, Detection, DetectorHandle, ExtractorHandle, GuidanceRuntime,
    RecognizerHandle, RemoteCleanup, RuntimeSources, SpeechSlot, StatusEvent, StatusReason,
    TwoStageExtractor, VideoSourceHandle,
};

use crate::commands::{dispatch, ConsoleInput, HELP};
use crate::console::{spawn_stdin_reader, StdinRecognizer, SESSION_IDLE_TIMEOUT};
use crate::settings::{default_settings_path, load_settings, AppSettings};
use crate::state::AppState;

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;

fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensai=info".parse().unwrap()),
        )
        .init();

    info!("SensAI starting");

    let settings_path = default_settings_path();
    let mut app_settings = load_settings(&settings_path);
    app_settings.apply_env_overrides();
    info!(
        settings_path = ?settings_path,
        wake_phrase = %app_settings.wake_phrase,
        center_policy = %app_settings.center_policy,
        vision_interval_ms = app_settings.vision_interval_ms,
        voice_commands = app_settings.voice_commands_enabled,
        cleanup = app_settings.cleanup_opt_in,
        "settings loaded"
    );

    // ── Adapters ──────────────────────────────────────────────────────────
    let extractor = build_extractor(&app_settings);
    let video = VideoSourceHandle::new(StillFrameSource::new(FRAME_WIDTH, FRAME_HEIGHT));
    warn!("no camera or detector backend in the headless host — using scripted detections");
    let detector = DetectorHandle::new(ScriptedDetector::new(demo_script()));
    let actuator = ConsoleActuator::spawn(Duration::from_millis(app_settings.speech_word_interval_ms))
        .context("failed to start speech worker")?;

    let coordinator = Arc::new(Coordinator::new(
        app_settings.coordinator_config(),
        SpeechSlot::new(actuator, app_settings.speech_lang.clone()),
        video.clone(),
        extractor,
    ));
    let runtime = Arc::new(GuidanceRuntime::new(
        Arc::clone(&coordinator),
        app_settings.runtime_config(),
    ));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sensai-rt")
        .build()
        .context("failed to build tokio runtime")?;

    let state = Arc::new(AppState::new(runtime, app_settings.clone(), settings_path));
    let result = rt.block_on(run(state, detector, video, app_settings));
    // The recognizer supervisor may still be parked on a blocking thread.
    rt.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run(
    state: Arc<AppState>,
    detector: DetectorHandle,
    video: VideoSourceHandle,
    settings: AppSettings,
) -> anyhow::Result<()> {
    let coordinator = Arc::clone(state.coordinator());

    // ── Forward coordinator events → stdout ───────────────────────────────
    // Per-tick detection refreshes are left to `/status`.
    spawn_printer(
        "status",
        coordinator.subscribe_status(),
        |e: &StatusEvent| e.reason != StatusReason::Detections,
        Arc::clone(&state.events_lagged),
    );
    spawn_printer(
        "speech",
        coordinator.subscribe_speech(),
        |_| true,
        Arc::clone(&state.events_lagged),
    );
    spawn_printer(
        "guidance",
        coordinator.subscribe_guidance(),
        |_| true,
        Arc::clone(&state.events_lagged),
    );

    // ── Input ─────────────────────────────────────────────────────────────
    let (transcript_tx, transcript_rx) = crossbeam_channel::unbounded();
    let (command_tx, mut command_rx) = mpsc::channel(16);
    spawn_stdin_reader(transcript_tx, command_tx).context("failed to start stdin reader")?;

    let recognizer = settings
        .voice_commands_enabled
        .then(|| RecognizerHandle::new(StdinRecognizer::new(transcript_rx, SESSION_IDLE_TIMEOUT)));

    state.runtime.start(RuntimeSources {
        detector,
        video,
        recognizer,
    })?;
    println!("{HELP}");

    while let Some(input) = command_rx.recv().await {
        if input == ConsoleInput::Quit {
            break;
        }
        match dispatch(&state, input).await {
            Ok(out) => println!("{out}"),
            Err(e) => println!("error: {e}"),
        }
    }

    state.runtime.stop()?;
    let diag = state.diagnostics_snapshot();
    info!(
        console_commands = diag.console_commands,
        console_rejected = diag.console_rejected,
        events_lagged = diag.events_lagged,
        "app diagnostics snapshot on stop"
    );
    Ok(())
}

/// Local placeholder OCR, optionally followed by remote cleanup.
fn build_extractor(settings: &AppSettings) -> ExtractorHandle {
    let extractor = TwoStageExtractor::new(FixedTextRecognizer::new(
        settings.placeholder_ocr_text.clone(),
    ));
    let Some(config) = settings.remote_cleanup_config() else {
        info!("remote text cleanup disabled");
        return ExtractorHandle::new(extractor);
    };
    match RemoteCleanup::new(config) {
        Ok(cleanup) => {
            info!("remote text cleanup enabled");
            ExtractorHandle::new(extractor.with_cleanup(cleanup))
        }
        Err(e) => {
            warn!("remote text cleanup unavailable — local OCR only: {e}");
            ExtractorHandle::new(extractor)
        }
    }
}

/// A person walking toward the camera from the left, then a stable chair.
fn demo_script() -> Vec<Vec<Detection>> {
    let person = |side: f32| {
        Detection::new(
            "person",
            BoundingBox::new(120.0, 80.0, side, side * 1.8),
            0.87,
        )
    };
    let chair = Detection::new("chair", BoundingBox::new(300.0, 260.0, 40.0, 60.0), 0.74);
    let mut script: Vec<Vec<Detection>> = (0..12)
        .map(|i| vec![person(60.0 + 8.0 * i as f32)])
        .collect();
    script.extend((0..8).map(|_| vec![chair.clone()]));
    script.extend((0..5).map(|_| Vec::new()));
    script
}

fn spawn_printer<E>(
    label: &'static str,
    mut rx: broadcast::Receiver<E>,
    keep: fn(&E) -> bool,
    lagged: Arc<AtomicUsize>,
) where
    E: Serialize + Clone + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if !keep(&event) => {}
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => println!("{label} {json}"),
                    Err(e) => warn!("serialize {label} event: {e}"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    lagged.fetch_add(n as usize, Ordering::Relaxed);
                    warn!("{label} receiver lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
