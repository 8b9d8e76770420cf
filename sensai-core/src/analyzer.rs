//! Proximity / direction analysis over two consecutive detection batches.
//!
//! ## Algorithm (per accepted cycle)
//!
//! 1. For each detection in the current batch, pick the previous detection of
//!    the same class whose bbox center is nearest (ties → earliest index).
//! 2. If `current.area > previous.area * growth_factor` → `Approaching`.
//! 3. Compare the object center x against the frame center x using the
//!    configured `CenterPolicy` → `OffCenterLeft` / `OffCenterRight`.
//! 4. De-duplicate on `(class, kind)` keeping first occurrence.
//!
//! Only two frames are ever compared; there is no smoothing.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::detection::{Detection, DetectionBatch};

/// Default area growth ratio that counts as "approaching".
pub const DEFAULT_GROWTH_FACTOR: f32 = 1.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    Approaching,
    OffCenterLeft,
    OffCenterRight,
}

/// How an object's horizontal position is judged off-center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "policy")]
pub enum CenterPolicy {
    /// Off-center when the object center is more than `margin_px` away from
    /// the frame center. `margin_px = 0` flags anything not exactly centered.
    #[serde(rename_all = "camelCase")]
    FullCenter { margin_px: f32 },
    /// Stricter: off-center only when the object center is more than half
    /// the frame-center distance away (i.e. outside the middle half of the
    /// frame).
    HalfCenter,
}

impl Default for CenterPolicy {
    fn default() -> Self {
        Self::FullCenter { margin_px: 0.0 }
    }
}

impl CenterPolicy {
    fn margin(&self, frame_center_x: f32) -> f32 {
        match *self {
            Self::FullCenter { margin_px } => margin_px.max(0.0),
            Self::HalfCenter => frame_center_x / 2.0,
        }
    }

    /// Classify an object center against the frame center.
    pub fn classify(&self, object_center_x: f32, frame_center_x: f32) -> Option<SignalKind> {
        let margin = self.margin(frame_center_x);
        if object_center_x < frame_center_x - margin {
            Some(SignalKind::OffCenterLeft)
        } else if object_center_x > frame_center_x + margin {
            Some(SignalKind::OffCenterRight)
        } else {
            None
        }
    }
}

/// A derived guidance cue. Never stored beyond producing an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceSignal {
    pub class: String,
    pub kind: SignalKind,
    pub at: Instant,
}

impl GuidanceSignal {
    /// Spoken form of the signal.
    pub fn utterance_text(&self) -> String {
        match self.kind {
            SignalKind::Approaching => format!("{} is approaching!", self.class),
            SignalKind::OffCenterLeft => "Move to the left!".into(),
            SignalKind::OffCenterRight => "Move to the right!".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProximityAnalyzer {
    growth_factor: f32,
    center_policy: CenterPolicy,
}

impl ProximityAnalyzer {
    pub fn new(growth_factor: f32, center_policy: CenterPolicy) -> Self {
        Self {
            growth_factor,
            center_policy,
        }
    }

    pub fn growth_factor(&self) -> f32 {
        self.growth_factor
    }

    pub fn center_policy(&self) -> CenterPolicy {
        self.center_policy
    }

    /// Compare `current` against `previous` and derive guidance signals.
    pub fn analyze(&self, current: &DetectionBatch, previous: &DetectionBatch) -> Vec<GuidanceSignal> {
        let frame_center_x = current.frame_center_x();
        let mut signals: Vec<GuidanceSignal> = Vec::new();

        for detection in &current.detections {
            let Some(prior) = nearest_same_class(detection, &previous.detections) else {
                continue;
            };

            if detection.bbox.area() > prior.bbox.area() * self.growth_factor {
                push_unique(&mut signals, detection, SignalKind::Approaching, current.captured_at);
            }

            if let Some(kind) = self
                .center_policy
                .classify(detection.bbox.center_x(), frame_center_x)
            {
                push_unique(&mut signals, detection, kind, current.captured_at);
            }
        }

        signals
    }
}

impl Default for ProximityAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_GROWTH_FACTOR, CenterPolicy::default())
    }
}

/// Nearest previous detection of the same class by bbox-center distance.
/// Ties resolve to the earliest detection in `previous`.
fn nearest_same_class<'a>(current: &Detection, previous: &'a [Detection]) -> Option<&'a Detection> {
    previous
        .iter()
        .filter(|p| p.class == current.class)
        .fold(None, |best: Option<(&Detection, f32)>, candidate| {
            let distance = candidate.bbox.center_distance(&current.bbox);
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((candidate, distance)),
            }
        })
        .map(|(d, _)| d)
}

fn push_unique(signals: &mut Vec<GuidanceSignal>, detection: &Detection, kind: SignalKind, at: Instant) {
    if signals
        .iter()
        .any(|s| s.kind == kind && s.class == detection.class)
    {
        return;
    }
    signals.push(GuidanceSignal {
        class: detection.class.clone(),
        kind,
        at,
    });
}
