use thiserror::Error;

/// All errors produced by sensai-core.
///
/// Every variant is recoverable at the coordinator level: the coordinator
/// turns them into a spoken or visible notification and keeps running.
#[derive(Debug, Error)]
pub enum SensaiError {
    #[error("no frame could be captured from the video source")]
    CaptureUnavailable,

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("speech recognition is not supported in this environment")]
    RecognizerUnsupported,

    #[error("speech synthesis is not supported in this environment")]
    ActuatorUnsupported,

    #[error("a text capture is already in progress")]
    CaptureInProgress,

    #[error("detection error: {0}")]
    Detection(String),

    #[error("runtime is already running")]
    AlreadyRunning,

    #[error("runtime is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SensaiError {
    /// Message surfaced to the UI collaborator for per-request failures.
    pub fn user_message(&self) -> String {
        match self {
            Self::CaptureUnavailable => "Failed to capture image from the webcam".into(),
            Self::ExtractionFailed(_) => "Failed to read text from the image".into(),
            Self::RecognizerUnsupported => {
                "Voice commands are not supported here; use the on-screen controls".into()
            }
            Self::ActuatorUnsupported => {
                "Spoken feedback is not supported here; guidance is shown on screen".into()
            }
            Self::CaptureInProgress => "Text capture already in progress".into(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SensaiError>;
