// THEORY:
// The `detection` module defines the narrow seam between the engine and whatever
// produces detections (a neural detector with a tracker, a replay file, a test
// fixture). A `Detection` is a transient, per-frame record; the engine never
// holds on to one beyond the frame being processed.
//
// Track identity is a black-box contract of the source. If the source loses a
// target and hands it a new id, the engine sees two separate exposures. That is
// accepted behavior, not something the engine tries to repair.

use crate::error::{ExposureError, Result};
use serde::{Deserialize, Serialize};

/// A single detected target in a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// The persistent identifier assigned by the source's tracker.
    pub track_id: u64,
    /// The detector's class name for this target (e.g. "T", "CT_HEAD").
    pub class_label: String,
    /// The detector's confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Detection {
    pub fn new(track_id: u64, class_label: impl Into<String>, confidence: f64) -> Self {
        Self {
            track_id,
            class_label: class_label.into(),
            confidence,
        }
    }

    /// Checks that the detection carries everything the tracker needs.
    pub fn validate(&self) -> Result<()> {
        if self.class_label.trim().is_empty() {
            return Err(ExposureError::Input(format!(
                "track {} has an empty class label",
                self.track_id
            )));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ExposureError::Input(format!(
                "track {} has confidence {} outside [0, 1]",
                self.track_id, self.confidence
            )));
        }
        Ok(())
    }
}

/// Anything that can turn a frame into a set of tracked detections.
///
/// Implementations are invoked once per sampled frame, in frame order, and may
/// keep internal state (a tracker, a file cursor) between calls.
pub trait DetectionSource {
    type Frame;

    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<Detection>>;
}
