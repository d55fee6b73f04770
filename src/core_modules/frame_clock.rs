// THEORY:
// Exposure times are derived from frame indices, not wall-clock time. The
// `FrameClock` owns that conversion and the sampling stride (only every N-th
// frame is sent to the detector), so the video driver and the replay path agree
// on what "current time" means.

use crate::error::{ExposureError, Result};

pub const DEFAULT_STRIDE: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
    stride: u64,
}

impl FrameClock {
    pub fn new(fps: f64, stride: u64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ExposureError::Configuration(format!(
                "frame rate must be positive (got {fps})"
            )));
        }
        if stride == 0 {
            return Err(ExposureError::Configuration(
                "frame stride must be at least 1".to_owned(),
            ));
        }
        Ok(Self { fps, stride })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Seconds since the start of the stream for a zero-based frame index.
    pub fn time_of(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.fps
    }

    /// Whether the frame at `frame_index` is sent to the detector.
    pub fn samples(&self, frame_index: u64) -> bool {
        frame_index % self.stride == 0
    }

    /// The time used to flush open windows once `frames_read` frames were decoded.
    pub fn end_time(&self, frames_read: u64) -> f64 {
        self.time_of(frames_read)
    }

    /// Time between two consecutive sampled frames.
    pub fn sample_step(&self) -> f64 {
        self.stride as f64 / self.fps
    }
}
