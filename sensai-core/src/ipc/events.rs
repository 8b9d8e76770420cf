//! Coordinator event types.
//!
//! | Event | Receiver |
//! |-------|----------|
//! | `StatusEvent` | `Coordinator::subscribe_status` |
//! | `SpeechEvent` | `Coordinator::subscribe_speech` |
//! | `GuidanceEvent` | `Coordinator::subscribe_guidance` |

use serde::{Deserialize, Serialize};

use crate::analyzer::SignalKind;
use crate::detection::Detection;
use crate::mode::Mode;
use crate::speech::Priority;

// ---------------------------------------------------------------------------
// UI snapshot
// ---------------------------------------------------------------------------

/// Everything the UI collaborator renders. Pure read model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSnapshot {
    pub mode: Mode,
    /// Transient notification (e.g. "Command not recognized."), cleared
    /// once its TTL passes.
    pub notification: Option<String>,
    pub last_error: Option<String>,
    pub last_captured_text: Option<String>,
    /// Detections of the most recent batch; empty after an empty batch.
    pub detections: Vec<Detection>,
    /// A capture-and-extract request is in flight.
    pub extracting: bool,
}

/// Emitted whenever the UI snapshot changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub reason: StatusReason,
    pub snapshot: UiSnapshot,
}

/// Why a status event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusReason {
    ModeChanged,
    Notification,
    ExtractionStarted,
    ExtractionFinished,
    ExtractionFailed,
    CameraFlipped,
    Detections,
}

// ---------------------------------------------------------------------------
// Speech events
// ---------------------------------------------------------------------------

/// Emitted for every utterance forwarded to the speech actuator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEvent {
    pub seq: u64,
    pub text: String,
    pub priority: Priority,
}

// ---------------------------------------------------------------------------
// Guidance events
// ---------------------------------------------------------------------------

/// Emitted once per accepted analysis cycle that derived at least one signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceEvent {
    pub seq: u64,
    pub cues: Vec<GuidanceCue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceCue {
    pub class: String,
    pub kind: SignalKind,
    /// Composed utterance text, whether or not it was actually spoken.
    pub utterance: String,
}
