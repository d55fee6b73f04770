use anyhow::{Context, Result, bail};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;

/// A decoded frame selected for detection.
pub struct SampledFrame {
    /// Zero-based index of the frame in the video.
    pub index: u64,
    pub time: f64,
    /// BGR pixels as decoded by OpenCV.
    pub image: Mat,
}

pub struct VideoInput {
    capture: VideoCapture,
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoInput {
    pub fn open(path: &Path) -> Result<Self> {
        let source = path.to_str().context("video path is not valid UTF-8")?;
        let capture = VideoCapture::from_file(source, videoio::CAP_ANY)
            .with_context(|| format!("failed to open video {}", path.display()))?;
        if !capture.is_opened()? {
            bail!("could not open video file {}", path.display());
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as u64;
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;

        Ok(Self {
            capture,
            fps,
            frame_count,
            width,
            height,
        })
    }

    /// Reads the next frame, or `None` at end of stream.
    pub fn read(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 { self.frame_count as f64 / self.fps } else { 0.0 }
    }
}
