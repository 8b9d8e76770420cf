//! Text extraction pipeline.
//!
//! The coordinator only sees the `TextExtractor` contract:
//! `extract(frame) -> Result<String>`. Any failure is reported as a single
//! opaque `SensaiError::ExtractionFailed`.
//!
//! `TwoStageExtractor` is the reference implementation:
//!
//! ```text
//! Frame ─► TextRecognizer (local OCR) ─► normalize_ocr_text ─► TextCleanup (optional, remote)
//! ```
//!
//! The cleanup stage is best effort: if it fails, the locally normalised text
//! is returned instead.

pub mod cleanup;
pub mod stub;

#[cfg(feature = "remote-cleanup")]
pub mod remote;

#[cfg(feature = "remote-cleanup")]
pub use remote::{RemoteCleanup, RemoteCleanupConfig};

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::capture::Frame;
use crate::error::{Result, SensaiError};

pub use cleanup::normalize_ocr_text;

/// Contract for the full frame → text pipeline used by the coordinator.
pub trait TextExtractor: Send + 'static {
    /// Extract readable text from a frame.
    ///
    /// # Errors
    /// `SensaiError::ExtractionFailed` when recognition fails or yields no text.
    fn extract(&mut self, frame: &Frame) -> Result<String>;
}

/// Local recognition stage (e.g. Tesseract).
pub trait TextRecognizer: Send + 'static {
    fn recognize(&mut self, frame: &Frame) -> Result<String>;
}

/// Post-recognition cleanup stage (e.g. an LLM fixing OCR noise).
pub trait TextCleanup: Send + 'static {
    fn clean(&mut self, text: &str) -> Result<String>;
}

/// Thread-safe reference-counted handle to any `TextExtractor` implementor.
#[derive(Clone)]
pub struct ExtractorHandle(pub Arc<Mutex<dyn TextExtractor>>);

impl ExtractorHandle {
    pub fn new<E: TextExtractor>(extractor: E) -> Self {
        Self(Arc::new(Mutex::new(extractor)))
    }
}

impl std::fmt::Debug for ExtractorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorHandle").finish_non_exhaustive()
    }
}

/// Local recognition followed by an optional cleanup pass.
pub struct TwoStageExtractor {
    recognizer: Box<dyn TextRecognizer>,
    cleanup: Option<Box<dyn TextCleanup>>,
}

impl TwoStageExtractor {
    pub fn new<R: TextRecognizer>(recognizer: R) -> Self {
        Self {
            recognizer: Box::new(recognizer),
            cleanup: None,
        }
    }

    pub fn with_cleanup<C: TextCleanup>(mut self, cleanup: C) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }
}

impl TextExtractor for TwoStageExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<String> {
        let raw = self.recognizer.recognize(frame).map_err(|e| match e {
            SensaiError::ExtractionFailed(_) => e,
            other => SensaiError::ExtractionFailed(other.to_string()),
        })?;

        let local = normalize_ocr_text(&raw);
        if local.is_empty() {
            return Err(SensaiError::ExtractionFailed(
                "no readable text recognised".into(),
            ));
        }
        debug!(raw_chars = raw.len(), local_chars = local.len(), "local OCR stage done");

        let Some(cleanup) = self.cleanup.as_mut() else {
            return Ok(local);
        };

        match cleanup.clean(&local) {
            Ok(cleaned) if !cleaned.trim().is_empty() => Ok(cleaned.trim().to_string()),
            Ok(_) => {
                warn!("cleanup stage returned empty text — using local OCR output");
                Ok(local)
            }
            Err(e) => {
                warn!(error = %e, "cleanup stage failed — using local OCR output");
                Ok(local)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::stub::FixedTextRecognizer;

    struct UppercaseCleanup;

    impl TextCleanup for UppercaseCleanup {
        fn clean(&mut self, text: &str) -> Result<String> {
            Ok(text.to_uppercase())
        }
    }

    struct BrokenCleanup;

    impl TextCleanup for BrokenCleanup {
        fn clean(&mut self, _text: &str) -> Result<String> {
            Err(SensaiError::Other(anyhow::anyhow!("endpoint unreachable")))
        }
    }

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&mut self, _frame: &Frame) -> Result<String> {
            Err(SensaiError::Io(std::io::Error::other("tesseract crashed")))
        }
    }

    fn frame() -> Frame {
        Frame::blank(8, 8)
    }

    #[test]
    fn local_stage_only_returns_normalised_text() {
        let mut extractor = TwoStageExtractor::new(FixedTextRecognizer::new("  EXIT \n\n  ~~ \n"));
        assert_eq!(extractor.extract(&frame()).expect("extract"), "EXIT");
    }

    #[test]
    fn cleanup_stage_is_applied() {
        let mut extractor =
            TwoStageExtractor::new(FixedTextRecognizer::new("open 9 to 5")).with_cleanup(UppercaseCleanup);
        assert_eq!(extractor.extract(&frame()).expect("extract"), "OPEN 9 TO 5");
    }

    #[test]
    fn cleanup_failure_falls_back_to_local_text() {
        let mut extractor =
            TwoStageExtractor::new(FixedTextRecognizer::new("platform 4")).with_cleanup(BrokenCleanup);
        assert_eq!(extractor.extract(&frame()).expect("extract"), "platform 4");
    }

    #[test]
    fn empty_recognition_is_extraction_failure() {
        let mut extractor = TwoStageExtractor::new(FixedTextRecognizer::new(" \n ||| \n"));
        assert!(matches!(
            extractor.extract(&frame()),
            Err(SensaiError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn recognizer_errors_become_extraction_failure() {
        let mut extractor = TwoStageExtractor::new(FailingRecognizer);
        match extractor.extract(&frame()) {
            Err(SensaiError::ExtractionFailed(msg)) => assert!(msg.contains("tesseract crashed")),
            other => panic!("expected ExtractionFailed, got {other:?}"),
        }
    }
}
