//! `ScriptedDetector` — placeholder vision backend replaying canned detections.
//!
//! Used by the headless host and in tests so the full
//! vision → coordinator → speech path can be exercised without a model.

use tracing::debug;

use crate::capture::Frame;
use crate::detection::{Detection, DetectionBatch, FrameDetector};
use crate::error::{Result, SensaiError};

/// Replays a fixed script of per-frame detections, looping at the end.
///
/// An empty script yields empty batches forever. A frame without pixels is
/// rejected the way a real model rejects an empty input tensor.
pub struct ScriptedDetector {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl Default for ScriptedDetector {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FrameDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        if frame.is_empty() {
            return Err(SensaiError::Detection(format!(
                "empty {}x{} frame",
                frame.width, frame.height
            )));
        }
        let detections = if self.script.is_empty() {
            Vec::new()
        } else {
            let step = self.script[self.cursor % self.script.len()].clone();
            self.cursor = self.cursor.wrapping_add(1);
            step
        };
        debug!(count = detections.len(), "ScriptedDetector::detect");
        Ok(DetectionBatch::new(detections, frame.width, frame.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    #[test]
    fn replays_script_in_a_loop() {
        let bottle = Detection::new("bottle", BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9);
        let mut detector = ScriptedDetector::new(vec![vec![bottle.clone()], vec![]]);
        let frame = Frame::blank(320, 240);

        assert_eq!(detector.detect(&frame).expect("first").detections, vec![bottle.clone()]);
        assert!(detector.detect(&frame).expect("second").is_empty());
        assert_eq!(detector.detect(&frame).expect("third").detections, vec![bottle]);
    }

    #[test]
    fn empty_frame_is_a_detection_error() {
        let bottle = Detection::new("bottle", BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9);
        let mut detector = ScriptedDetector::new(vec![vec![bottle]]);
        let err = detector.detect(&Frame::blank(0, 0)).expect_err("empty frame");
        assert!(matches!(err, SensaiError::Detection(_)));
        assert_eq!(err.user_message(), "detection error: empty 0x0 frame");
    }

    #[test]
    fn batch_takes_frame_dimensions() {
        let mut detector = ScriptedDetector::default();
        let batch = detector.detect(&Frame::blank(640, 480)).expect("detect");
        assert_eq!(batch.frame_width, 640);
        assert_eq!(batch.frame_height, 480);
        assert!(batch.is_empty());
    }
}
