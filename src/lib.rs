// THEORY:
// This file is the main entry point for the `exposure_lens` library crate.
// It defines the public API used by the tester binary and the visualizer.
//
// The primary export is the `ExposurePipeline`, which takes per-frame
// detections of tracked opponents and turns them into merged, categorized
// exposure windows. The building blocks (`core_modules`) stay public so that
// callers can drive the tracker or the merger on their own, and the
// `parallel_pipeline` lets an expensive detector run on several workers while
// the tracker still sees frames in order.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod report;

pub use core_modules::categorizer::{categorize, CategoryThresholds, TacticalCategory};
pub use core_modules::detection::{Detection, DetectionSource};
pub use core_modules::exposure_window::{ExposureInterval, ExposureWindow, MergedInterval, WindowOpened};
pub use core_modules::frame_clock::FrameClock;
pub use core_modules::merger::{merge, GapThreshold};
pub use core_modules::replay::{FrameRecord, ReplaySource};
pub use core_modules::tracker::ExposureTracker;
pub use error::{ExposureError, Result};
pub use pipeline::{ExposurePipeline, PipelineConfig};
pub use report::{ExposureEntry, ExposureReport, ExposureSummary};
