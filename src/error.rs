// THEORY:
// Every fallible operation in the engine reports through a single error enum.
// The variants mirror the three ways a caller can misuse the engine (bad
// configuration, out-of-order time, malformed detections) plus one for
// failures raised by an external `DetectionSource`. Errors are always
// returned synchronously to the caller; the engine never retries or swallows
// them, and a call that fails leaves all tracking state untouched.

use thiserror::Error;

/// Errors produced by the exposure engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExposureError {
    /// A tunable value is outside its valid range (gap threshold, category
    /// thresholds, frame rate, stride...).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A timestamp arrived out of order or was not finite. The tracker rejects
    /// the call; callers must correct the time or `reset()` before continuing.
    #[error("time sequence violation: {current} s supplied after {last} s")]
    Sequence { last: f64, current: f64 },

    /// A detection or replay record is missing data or carries invalid values.
    #[error("invalid input: {0}")]
    Input(String),

    /// The external detection source failed to produce detections for a frame.
    #[error("detection source failure: {0}")]
    Source(String),
}

/// Result type for exposure engine operations.
pub type Result<T> = std::result::Result<T, ExposureError>;
