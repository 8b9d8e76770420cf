//! Object detection types and the vision adapter contract.
//!
//! The `FrameDetector` trait decouples the coordinator from any specific
//! vision backend (COCO-SSD in a browser, an ONNX YOLO session, a scripted
//! stub). The coordinator never calls a detector itself: the vision loop in
//! [`crate::runtime`] polls one on a fixed cadence and pushes the resulting
//! batches into [`crate::Coordinator::on_detection_batch`].

pub mod stub;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::capture::Frame;
use crate::error::Result;

/// Axis-aligned bounding box in pixel space, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        let dx = self.center_x() - other.center_x();
        let dy = self.center_y() - other.center_y();
        (dx * dx + dy * dy).sqrt()
    }
}

/// One labelled object found in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Object class label, e.g. `"bottle"`.
    pub class: String,
    pub bbox: BoundingBox,
    /// Classifier confidence in [0.0, 1.0].
    pub score: f32,
}

impl Detection {
    pub fn new(class: impl Into<String>, bbox: BoundingBox, score: f32) -> Self {
        Self {
            class: class.into(),
            bbox,
            score: score.clamp(0.0, 1.0),
        }
    }
}

/// All detections for a single frame.
///
/// Immutable once produced: the coordinator keeps at most one previous batch
/// around for frame-to-frame comparison.
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    /// Width of the analysed frame in pixels. The frame center used for
    /// direction cues is `frame_width / 2`.
    pub frame_width: u32,
    pub frame_height: u32,
    pub captured_at: Instant,
}

impl DetectionBatch {
    pub fn new(detections: Vec<Detection>, frame_width: u32, frame_height: u32) -> Self {
        Self {
            detections,
            frame_width,
            frame_height,
            captured_at: Instant::now(),
        }
    }

    pub fn frame_center_x(&self) -> f32 {
        self.frame_width as f32 / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Drop detections below `min_score`, keeping the original order.
    pub fn retain_confident(mut self, min_score: f32) -> Self {
        self.detections.retain(|d| d.score >= min_score);
        self
    }
}

/// Contract for vision backends.
pub trait FrameDetector: Send + 'static {
    /// Run the classifier over one frame.
    ///
    /// # Errors
    /// Returns an error if inference fails. The vision loop logs it and
    /// moves on to the next tick.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch>;
}

/// Thread-safe reference-counted handle to any `FrameDetector` implementor.
#[derive(Clone)]
pub struct DetectorHandle(pub Arc<Mutex<dyn FrameDetector>>);

impl DetectorHandle {
    pub fn new<D: FrameDetector>(detector: D) -> Self {
        Self(Arc::new(Mutex::new(detector)))
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle").finish_non_exhaustive()
    }
}
