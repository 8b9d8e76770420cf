//! Single-slot speech output.
//!
//! `SpeechSlot::submit` atomically cancels whatever is being spoken and starts
//! the new utterance. There is no queue; pacing is the rate limiter's job.

pub mod console;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::mode::Mode;

/// Default BCP-47 language tag for synthesized speech.
pub const DEFAULT_SPEECH_LANG: &str = "en-US";

/// Where an utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Guidance,
    Confirmation,
    Extraction,
}

/// One candidate speech output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub priority: Priority,
    /// Mode that must be active when the utterance is offered. `None` means
    /// always audible.
    pub requires_mode: Option<Mode>,
}

impl Utterance {
    pub fn guidance(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::Guidance,
            requires_mode: Some(Mode::Guide),
        }
    }

    pub fn confirmation(text: impl Into<String>, requires_mode: Option<Mode>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::Confirmation,
            requires_mode,
        }
    }

    pub fn extraction(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::Extraction,
            requires_mode: None,
        }
    }

    /// Whether the utterance may be spoken while `mode` is active.
    pub fn allowed_in(&self, mode: Mode) -> bool {
        self.requires_mode.map_or(true, |required| required == mode)
    }
}

/// Contract for speech synthesis backends.
pub trait SpeechActuator: Send + 'static {
    /// Whether speech synthesis is available at all. Probed once at startup.
    fn is_supported(&self) -> bool {
        true
    }

    /// Start speaking `text`. Must not block until playback ends.
    fn speak(&mut self, text: &str, lang: &str) -> Result<()>;

    /// Stop the current utterance, if any.
    fn cancel(&mut self);
}

/// The one shared speech output resource.
#[derive(Clone)]
pub struct SpeechSlot {
    actuator: Arc<Mutex<dyn SpeechActuator>>,
    lang: String,
}

impl SpeechSlot {
    pub fn new<A: SpeechActuator>(actuator: A, lang: impl Into<String>) -> Self {
        Self {
            actuator: Arc::new(Mutex::new(actuator)),
            lang: lang.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.actuator.lock().is_supported()
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Cancel the in-flight utterance and start `utterance`, under one lock.
    ///
    /// # Errors
    /// Propagates the actuator's `speak` error. The previous utterance is
    /// already cancelled at that point.
    pub fn submit(&self, utterance: &Utterance) -> Result<()> {
        let mut actuator = self.actuator.lock();
        actuator.cancel();
        debug!(text = %utterance.text, priority = ?utterance.priority, "speech submit");
        actuator.speak(&utterance.text, &self.lang).inspect_err(|e| {
            warn!(error = %e, "speech actuator failed to start utterance");
        })
    }
}

impl std::fmt::Debug for SpeechSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechSlot")
            .field("lang", &self.lang)
            .finish_non_exhaustive()
    }
}
