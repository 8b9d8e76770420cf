//! # sensai-core
//!
//! Multimodal guidance coordinator for visually impaired users.
//!
//! ## Architecture
//!
//! ```text
//! VideoSource → FrameDetector (vision loop) ─► Coordinator::on_detection_batch
//!                                                    │
//!                                    ProximityAnalyzer (Guide mode, cooldown)
//!                                                    │
//! CommandRecognizer (supervised) ─► CommandParser ─► ModeMachine
//!                                                    │
//!                         VideoSource + TextExtractor (Capture mode, timeout)
//!                                                    │
//!                       mode gate → debounce → SpeechSlot (single slot)
//!                                                    │
//!                       broadcast::Sender<StatusEvent | SpeechEvent | GuidanceEvent>
//! ```
//!
//! Every collaborator (camera, detector, recognizer, OCR, speech) sits
//! behind a trait so hosts can plug in real devices or the bundled stubs.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod analyzer;
pub mod capture;
pub mod coordinator;
pub mod detection;
pub mod error;
pub mod extraction;
pub mod ipc;
pub mod mode;
pub mod rate_limit;
pub mod runtime;
pub mod speech;

// Convenience re-exports for downstream crates
pub use analyzer::{CenterPolicy, GuidanceSignal, ProximityAnalyzer, SignalKind};
pub use capture::{CameraFacing, Frame, VideoSource, VideoSourceHandle};
pub use coordinator::{Coordinator, CoordinatorConfig, DiagnosticsSnapshot};
pub use detection::{BoundingBox, Detection, DetectionBatch, DetectorHandle, FrameDetector};
pub use error::SensaiError;
pub use extraction::{ExtractorHandle, TextCleanup, TextExtractor, TextRecognizer, TwoStageExtractor};
pub use ipc::events::{
    GuidanceCue, GuidanceEvent, SpeechEvent, StatusEvent, StatusReason, UiSnapshot,
};
pub use mode::{Command, ManualToggle, Mode};
pub use runtime::{
    CommandRecognizer, GuidanceRuntime, RecognizerHandle, RestartPolicy, RuntimeConfig,
    RuntimeSources, TranscriptSink,
};
pub use speech::{SpeechActuator, SpeechSlot};

#[cfg(feature = "remote-cleanup")]
pub use extraction::{RemoteCleanup, RemoteCleanupConfig};
