// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires the layers
// together behind one object:
//
//     detections --> ExposureTracker --> closed intervals --> merge --> ExposureReport
//
// Callers feed it one sampled frame at a time (either detections they already
// have, or a frame plus a `DetectionSource`), then call `finish` once with the
// stream end time to receive the report.

use crate::core_modules::categorizer::CategoryThresholds;
use crate::core_modules::detection::{Detection, DetectionSource};
use crate::core_modules::merger::{self, GapThreshold};
use crate::core_modules::replay::ReplaySource;
use crate::core_modules::tracker::ExposureTracker;
use crate::error::{ExposureError, Result};
use crate::report::ExposureReport;
use std::io::BufRead;
use tracing::info;

// Re-export key data structures for the public API.
pub use crate::core_modules::exposure_window::{ExposureInterval, MergedInterval, WindowOpened};

pub const DEFAULT_HEAD_MARKER: &str = "HEAD";

/// Configuration for the ExposurePipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fragments of one track id closer than this are merged into one exposure.
    pub gap_threshold: GapThreshold,
    pub categories: CategoryThresholds,
    /// Case-insensitive substring of a class label that marks a head detection.
    pub head_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gap_threshold: GapThreshold::default(),
            categories: CategoryThresholds::default(),
            head_marker: DEFAULT_HEAD_MARKER.to_owned(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.categories.validate()?;
        if self.head_marker.trim().is_empty() {
            return Err(ExposureError::Configuration(
                "head marker must not be blank".to_owned(),
            ));
        }
        Ok(())
    }
}

/// The main, top-level struct for the exposure engine.
pub struct ExposurePipeline {
    tracker: ExposureTracker,
    config: PipelineConfig,
    frames_observed: u64,
}

impl ExposurePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tracker: ExposureTracker::new(),
            config,
            frames_observed: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ExposureTracker {
        &self.tracker
    }

    /// Subscribes to window-opened events, e.g. to persist a snapshot.
    pub fn on_window_opened<F>(&mut self, hook: F)
    where
        F: FnMut(&WindowOpened) + Send + 'static,
    {
        self.tracker.on_window_opened(hook);
    }

    pub fn frames_observed(&self) -> u64 {
        self.frames_observed
    }

    pub fn process_frame(&mut self, time: f64, detections: &[Detection]) -> Result<Vec<WindowOpened>> {
        let opened = self.tracker.observe(time, detections)?;
        self.frames_observed += 1;
        Ok(opened)
    }

    /// Runs `source` on `frame` and feeds the result to the tracker.
    pub fn process_with<S: DetectionSource>(
        &mut self,
        source: &mut S,
        frame: &S::Frame,
        time: f64,
    ) -> Result<Vec<WindowOpened>> {
        let detections = source.detect(frame)?;
        self.process_frame(time, &detections)
    }

    /// Flushes open windows at `end_time`, merges, and categorizes.
    pub fn finish(mut self, end_time: f64) -> Result<ExposureReport> {
        self.tracker.finalize(end_time)?;
        let closed = self.tracker.take_closed_intervals();
        let merged = merger::merge(&closed, self.config.gap_threshold);

        info!(
            frames = self.frames_observed,
            fragments = closed.len(),
            exposures = merged.len(),
            "exposure analysis complete"
        );

        Ok(ExposureReport::build(
            merged,
            closed.len(),
            &self.config.categories,
            &self.config.head_marker,
        ))
    }

    /// Analyzes a recorded detection stream. Windows still open after the last
    /// record are closed at that record's time.
    pub fn run_replay<R: BufRead>(mut self, replay: ReplaySource<R>) -> Result<ExposureReport> {
        let mut end_time = self.tracker.last_time().unwrap_or(0.0);
        for record in replay {
            let record = record?;
            self.process_frame(record.time, &record.detections)?;
            end_time = record.time;
        }
        self.finish(end_time)
    }
}
