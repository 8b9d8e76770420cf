//! `FixedTextRecognizer` — placeholder OCR stage returning canned text.

use tracing::debug;

use crate::capture::Frame;
use crate::error::Result;
use crate::extraction::TextRecognizer;

pub struct FixedTextRecognizer {
    text: String,
}

impl FixedTextRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextRecognizer for FixedTextRecognizer {
    fn recognize(&mut self, frame: &Frame) -> Result<String> {
        debug!(
            width = frame.width,
            height = frame.height,
            "FixedTextRecognizer::recognize"
        );
        Ok(self.text.clone())
    }
}
