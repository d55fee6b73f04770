// THEORY:
// The `exposure_window` module holds the data that the tracker produces. It is
// the time-domain counterpart of a detection: where a `Detection` says "target 7
// is visible in this frame", an exposure says "target 7 was visible from 3.20 s
// to 4.05 s".
//
// Two lifecycles are modelled separately:
// 1.  **Open windows** (`ExposureWindow`) exist only while a target is on-screen.
//     They are owned by the tracker and only their peak confidence changes.
// 2.  **Closed intervals** (`ExposureInterval`) are immutable records created
//     when a target disappears or the stream ends. Merged intervals share the
//     same shape, so a merged list can be fed back into the merger.

use serde::{Deserialize, Serialize};

/// A window that is still open because its target was visible in the latest frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureWindow {
    pub track_id: u64,
    /// Fixed when the window opens. Later detections never relabel it.
    pub class_label: String,
    pub start_time: f64,
    pub max_confidence: f64,
}

impl ExposureWindow {
    pub(crate) fn open(track_id: u64, class_label: &str, start_time: f64, confidence: f64) -> Self {
        Self {
            track_id,
            class_label: class_label.to_owned(),
            start_time,
            max_confidence: confidence,
        }
    }

    pub(crate) fn sustain(&mut self, confidence: f64) {
        if confidence > self.max_confidence {
            self.max_confidence = confidence;
        }
    }

    pub(crate) fn close(self, end_time: f64) -> ExposureInterval {
        ExposureInterval {
            track_id: self.track_id,
            class_label: self.class_label,
            start_time: self.start_time,
            end_time,
            duration: end_time - self.start_time,
            peak_confidence: self.max_confidence,
        }
    }
}

/// A completed period during which one track id was continuously visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureInterval {
    pub track_id: u64,
    pub class_label: String,
    pub start_time: f64,
    /// The time of the first frame in which the target was absent, or the
    /// stream end time for windows flushed by `finalize`.
    pub end_time: f64,
    /// Always `end_time - start_time`.
    pub duration: f64,
    /// The highest detector confidence observed while the window was open.
    pub peak_confidence: f64,
}

/// The merger emits intervals of the same shape it consumes.
pub type MergedInterval = ExposureInterval;

/// Emitted exactly once per newly opened window, so a caller can persist a
/// snapshot of the frame that first showed the target.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOpened {
    pub track_id: u64,
    pub class_label: String,
    pub time: f64,
}
