//! Video source contract.
//!
//! The video source is shared by two consumers: the vision loop pulls a frame
//! per tick for detection, and `capture_and_extract` pulls exactly one frame
//! per capture trigger. It also receives the camera-flip side effect.

pub mod stub;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Pixel encoding of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    Jpeg,
    Rgb8,
}

/// One still image from the camera.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// An all-black RGB frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(vec![0u8; len], width, height, FrameFormat::Rgb8)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }
}

/// Which physical camera is feeding frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Front camera.
    User,
    /// Rear camera (the useful one for guidance).
    #[default]
    Environment,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            Self::User => Self::Environment,
            Self::Environment => Self::User,
        }
    }
}

/// Contract for camera backends.
pub trait VideoSource: Send + 'static {
    /// Grab the current frame.
    ///
    /// # Errors
    /// `SensaiError::CaptureUnavailable` when no frame can be produced
    /// (camera not ready, permission revoked, stream ended).
    fn capture_frame(&mut self) -> Result<Frame>;

    /// Switch between front and rear camera. Returns the new facing.
    fn flip_camera(&mut self) -> CameraFacing;

    fn facing(&self) -> CameraFacing;
}

/// Thread-safe reference-counted handle to any `VideoSource` implementor.
#[derive(Clone)]
pub struct VideoSourceHandle(pub Arc<Mutex<dyn VideoSource>>);

impl VideoSourceHandle {
    pub fn new<S: VideoSource>(source: S) -> Self {
        Self(Arc::new(Mutex::new(source)))
    }
}

impl std::fmt::Debug for VideoSourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSourceHandle").finish_non_exhaustive()
    }
}
