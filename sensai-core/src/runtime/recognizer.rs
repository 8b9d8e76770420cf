//! Supervised command recognizer.
//!
//! A recognizer adapter blocks inside `listen`, pushing transcripts into a
//! `TranscriptSink` until its stream ends (browsers end recognition sessions
//! on silence or after a fixed duration). A clean end of stream is routine:
//! the supervisor restarts after `initial_backoff` and forgets earlier
//! failures. A failed session is surfaced as a notification and restarted
//! with exponential backoff; after `max_restarts` consecutive failures the
//! supervisor gives up.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::error::{Result, SensaiError};

/// Shown when the supervisor stops restarting the recognizer.
pub const RECOGNIZER_STOPPED_NOTIFICATION: &str =
    "Voice commands stopped; use the on-screen controls";

/// Shown each time a recognizer session fails and a restart is scheduled.
pub const RECOGNIZER_INTERRUPTED_NOTIFICATION: &str = "Voice commands interrupted; restarting";

/// Contract for speech-to-text command sources.
pub trait CommandRecognizer: Send + 'static {
    /// Whether speech recognition is available at all. Probed once.
    fn is_supported(&self) -> bool {
        true
    }

    /// Block, pushing transcripts into `sink`, until the stream ends.
    ///
    /// Implementations should return promptly once `sink.push` returns
    /// `false`.
    ///
    /// # Errors
    /// Any error ends the session; the supervisor decides whether to restart.
    fn listen(&mut self, sink: &TranscriptSink) -> Result<()>;
}

/// Thread-safe reference-counted handle to any `CommandRecognizer` implementor.
#[derive(Clone)]
pub struct RecognizerHandle(pub Arc<Mutex<dyn CommandRecognizer>>);

impl RecognizerHandle {
    pub fn new<R: CommandRecognizer>(recognizer: R) -> Self {
        Self(Arc::new(Mutex::new(recognizer)))
    }
}

impl std::fmt::Debug for RecognizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerHandle").finish_non_exhaustive()
    }
}

/// Where a recognizer delivers transcripts.
pub struct TranscriptSink {
    tx: mpsc::Sender<String>,
    running: Arc<AtomicBool>,
}

impl TranscriptSink {
    pub fn new(tx: mpsc::Sender<String>, running: Arc<AtomicBool>) -> Self {
        Self { tx, running }
    }

    /// Deliver one transcript. Returns `false` once the runtime is stopping
    /// or the consumer is gone; the recognizer should then return.
    pub fn push(&self, transcript: impl Into<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        let transcript = transcript.into().trim().to_lowercase();
        if transcript.is_empty() {
            return true;
        }
        self.tx.blocking_send(transcript).is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.tx.is_closed()
    }
}

/// Restart policy for the recognizer supervisor.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Delay before the first restart. Default: 250 ms.
    pub initial_backoff: Duration,
    /// Backoff ceiling. Default: 10 s.
    pub max_backoff: Duration,
    /// A failed session that ran at least this long resets the backoff.
    /// Default: 30 s.
    pub stable_after: Duration,
    /// Give up after this many consecutive failed sessions. `None` restarts
    /// forever. Default: `Some(8)`.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            stable_after: Duration::from_secs(30),
            max_restarts: Some(8),
        }
    }
}

impl RestartPolicy {
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

/// Run the supervisor on the current (blocking) thread until the runtime
/// stops or the policy gives up.
pub fn supervise(
    recognizer: RecognizerHandle,
    sink: TranscriptSink,
    policy: RestartPolicy,
    coordinator: Arc<Coordinator>,
) {
    if !recognizer.0.lock().is_supported() {
        let err = SensaiError::RecognizerUnsupported;
        warn!("{err} — voice command path disabled");
        coordinator.notify(err.user_message());
        return;
    }

    let mut backoff = policy.initial_backoff;
    let mut failures = 0u32;

    loop {
        let started = Instant::now();
        info!("recognizer session started");
        let outcome = recognizer.0.lock().listen(&sink);

        if !sink.running.load(Ordering::Relaxed) {
            debug!("runtime stopping — recognizer supervisor exits");
            return;
        }

        let delay = match outcome {
            Ok(()) => {
                debug!("recognizer stream ended");
                backoff = policy.initial_backoff;
                failures = 0;
                policy.initial_backoff
            }
            Err(e) => {
                if started.elapsed() >= policy.stable_after {
                    backoff = policy.initial_backoff;
                    failures = 0;
                }
                failures = failures.saturating_add(1);
                warn!(error = %e, failures, "recognizer session failed");

                if policy.max_restarts.is_some_and(|max| failures > max) {
                    warn!(failures, "recognizer keeps failing — giving up");
                    coordinator.notify(RECOGNIZER_STOPPED_NOTIFICATION);
                    return;
                }
                coordinator.notify(RECOGNIZER_INTERRUPTED_NOTIFICATION);
                let delay = backoff;
                backoff = policy.next_backoff(backoff);
                delay
            }
        };

        debug!(delay_ms = delay.as_millis() as u64, "restarting recognizer");
        if !sleep_while_running(delay, &sink.running) {
            return;
        }
    }
}

/// Sleep in short slices so a stop request is noticed promptly.
fn sleep_while_running(total: Duration, running: &AtomicBool) -> bool {
    const SLICE: Duration = Duration::from_millis(20);
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        std::thread::sleep(SLICE.min(deadline.saturating_duration_since(Instant::now())));
    }
    running.load(Ordering::Relaxed)
}
