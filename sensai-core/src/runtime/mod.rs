//! `GuidanceRuntime` — drives the coordinator from live sources.
//!
//! ## Lifecycle
//!
//! ```text
//! GuidanceRuntime::new(coordinator)
//!     └─► start(sources)   → vision loop + recognizer supervisor spawned
//!         └─► stop()       → running=false, async tasks aborted
//! ```
//!
//! `start()`/`stop()` in the wrong state return an error rather than panic.
//! Both must be called from inside a Tokio runtime.
//!
//! ## Tasks
//!
//! - **Vision loop** (async): ticks every `vision_interval`, runs
//!   capture + detection in `spawn_blocking`, pushes the batch. Missed ticks
//!   are skipped, so a slow detector never builds a backlog.
//! - **Recognizer supervisor** (`spawn_blocking`): see [`recognizer`].
//! - **Command forwarder** (async): drains transcripts into
//!   `Coordinator::on_command_transcript`, one at a time.

pub mod recognizer;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    capture::VideoSourceHandle,
    coordinator::Coordinator,
    detection::DetectorHandle,
    error::{Result, SensaiError},
};

pub use recognizer::{CommandRecognizer, RecognizerHandle, RestartPolicy, TranscriptSink};

/// Transcript channel capacity between recognizer thread and forwarder.
const TRANSCRIPT_CAP: usize = 32;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Vision polling period. Default: 200 ms.
    pub vision_interval: Duration,
    pub restart_policy: RestartPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            vision_interval: Duration::from_millis(200),
            restart_policy: RestartPolicy::default(),
        }
    }
}

/// Live inputs wired into the coordinator.
pub struct RuntimeSources {
    pub detector: DetectorHandle,
    pub video: VideoSourceHandle,
    /// `None` runs without voice commands (manual controls only).
    pub recognizer: Option<RecognizerHandle>,
}

pub struct GuidanceRuntime {
    coordinator: Arc<Coordinator>,
    config: RuntimeConfig,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GuidanceRuntime {
    pub fn new(coordinator: Arc<Coordinator>, config: RuntimeConfig) -> Self {
        Self {
            coordinator,
            config,
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the vision loop and, if given, the supervised recognizer.
    ///
    /// # Errors
    /// `SensaiError::AlreadyRunning` if already started.
    pub fn start(&self, sources: RuntimeSources) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SensaiError::AlreadyRunning);
        }

        let mut tasks = self.tasks.lock();

        tasks.push(tokio::spawn(run_vision_loop(
            Arc::clone(&self.coordinator),
            sources.detector,
            sources.video,
            self.config.vision_interval,
            Arc::clone(&self.running),
        )));

        match sources.recognizer {
            Some(recognizer) => {
                let (tx, rx) = mpsc::channel(TRANSCRIPT_CAP);
                let sink = TranscriptSink::new(tx, Arc::clone(&self.running));
                let policy = self.config.restart_policy.clone();
                let coordinator = Arc::clone(&self.coordinator);
                // Not tracked: a blocking thread cannot be aborted, it exits
                // once the sink reports closed.
                tokio::task::spawn_blocking(move || {
                    recognizer::supervise(recognizer, sink, policy, coordinator)
                });
                tasks.push(tokio::spawn(forward_commands(
                    Arc::clone(&self.coordinator),
                    rx,
                )));
            }
            None => info!("no recognizer configured — manual controls only"),
        }

        info!(
            vision_interval_ms = self.config.vision_interval.as_millis() as u64,
            "guidance runtime started"
        );
        Ok(())
    }

    /// Stop all loops.
    ///
    /// # Errors
    /// `SensaiError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SensaiError::NotRunning);
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let snap = self.coordinator.diagnostics_snapshot();
        info!(
            batches_in = snap.batches_in,
            cycles_accepted = snap.cycles_accepted,
            cycles_skipped = snap.cycles_skipped,
            signals_derived = snap.signals_derived,
            utterances_forwarded = snap.utterances_forwarded,
            utterances_debounced = snap.utterances_debounced,
            commands_parsed = snap.commands_parsed,
            captures_failed = snap.captures_failed,
            "guidance runtime stopped — diagnostics"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }
}

/// Poll the detector on a fixed cadence until `running` clears.
pub async fn run_vision_loop(
    coordinator: Arc<Coordinator>,
    detector: DetectorHandle,
    video: VideoSourceHandle,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    info!("vision loop started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut consecutive_errors = 0u32;

    while running.load(Ordering::Relaxed) {
        ticker.tick().await;
        if !running.load(Ordering::Relaxed) {
            break;
        }

        let detector = detector.clone();
        let video = video.clone();
        let result = tokio::task::spawn_blocking(move || {
            let frame = video.0.lock().capture_frame()?;
            detector.0.lock().detect(&frame)
        })
        .await;

        match result {
            Ok(Ok(batch)) => {
                consecutive_errors = 0;
                coordinator.on_detection_batch(batch);
            }
            Ok(Err(e)) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                // Log the first failure and then every 50th to avoid flooding.
                if consecutive_errors == 1 || consecutive_errors % 50 == 0 {
                    warn!(error = %e, consecutive_errors, "vision tick failed");
                }
            }
            Err(join_err) => {
                error!("detection task panicked: {join_err}");
            }
        }
    }
    info!("vision loop stopped");
}

async fn forward_commands(coordinator: Arc<Coordinator>, mut rx: mpsc::Receiver<String>) {
    while let Some(transcript) = rx.recv().await {
        debug!(%transcript, "transcript received");
        coordinator.on_command_transcript(&transcript).await;
    }
    debug!("transcript channel closed");
}
