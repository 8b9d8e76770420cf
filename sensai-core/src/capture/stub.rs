//! `StillFrameSource` — placeholder camera producing blank frames.

use tracing::{debug, info};

use crate::capture::{CameraFacing, Frame, VideoSource};
use crate::error::{Result, SensaiError};

/// Produces a blank frame of fixed size on every call.
///
/// `available = false` simulates a camera that never delivers a frame.
pub struct StillFrameSource {
    width: u32,
    height: u32,
    facing: CameraFacing,
    available: bool,
    frames_served: u64,
}

impl StillFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            facing: CameraFacing::default(),
            available: true,
            frames_served: 0,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0, 0)
        }
    }

    pub fn frames_served(&self) -> u64 {
        self.frames_served
    }
}

impl VideoSource for StillFrameSource {
    fn capture_frame(&mut self) -> Result<Frame> {
        if !self.available {
            return Err(SensaiError::CaptureUnavailable);
        }
        self.frames_served += 1;
        debug!(frames_served = self.frames_served, "StillFrameSource::capture_frame");
        Ok(Frame::blank(self.width, self.height))
    }

    fn flip_camera(&mut self) -> CameraFacing {
        self.facing = self.facing.flipped();
        info!(facing = ?self.facing, "camera flipped");
        self.facing
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }
}
