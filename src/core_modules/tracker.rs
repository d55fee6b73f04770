// THEORY:
// The `tracker` module is the heart of the engine. It turns the stateless list of
// `Detection`s from a single frame into exposure windows that persist over time.
// Identity association is NOT done here: the detection source already assigns
// track ids, and the tracker trusts them.
//
// Lifecycle of a window:
// 1.  **Open**: the first frame that contains a track id opens a window for it
//     at that frame's time and fires a `WindowOpened` event.
// 2.  **Sustain**: every following frame that still contains the id only raises
//     the window's peak confidence. The class label is never changed.
// 3.  **Close**: the first frame that no longer contains the id closes the window
//     with that frame's time as the end. `finalize` closes whatever is still open
//     when the stream ends.
//
// Opens and sustains for a frame are applied before closures are evaluated.
// Time must never go backwards between calls: closures use the current frame's
// time, so an out-of-order timestamp would produce negative or overlapping
// intervals. Such calls are rejected without touching any state.

use crate::core_modules::detection::Detection;
use crate::core_modules::exposure_window::{ExposureInterval, ExposureWindow, WindowOpened};
use crate::error::{ExposureError, Result};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// A subscriber invoked once for every newly opened window.
pub type OpenHook = Box<dyn FnMut(&WindowOpened) + Send>;

/// Owns the open-window mapping and the closed-interval sequence for one stream.
pub struct ExposureTracker {
    /// Windows for targets visible in the latest observed frame, keyed by track id.
    open_windows: BTreeMap<u64, ExposureWindow>,
    /// Completed intervals in the order they were closed.
    closed_intervals: Vec<ExposureInterval>,
    /// The time of the latest accepted `observe` or `finalize` call.
    last_time: Option<f64>,
    open_hooks: Vec<OpenHook>,
}

impl Default for ExposureTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ExposureTracker {
    pub fn new() -> Self {
        Self {
            open_windows: BTreeMap::new(),
            closed_intervals: Vec::new(),
            last_time: None,
            open_hooks: Vec::new(),
        }
    }

    /// Registers a hook that runs for every window opened from now on.
    pub fn on_window_opened<F>(&mut self, hook: F)
    where
        F: FnMut(&WindowOpened) + Send + 'static,
    {
        self.open_hooks.push(Box::new(hook));
    }

    /// Processes the detections of one sampled frame.
    ///
    /// Returns the windows opened by this frame, in detection order. Fails with
    /// `ExposureError::Sequence` if `current_time` is earlier than the previous
    /// call or not finite, and with `ExposureError::Input` if any detection is
    /// malformed. A failed call changes nothing.
    pub fn observe(&mut self, current_time: f64, detections: &[Detection]) -> Result<Vec<WindowOpened>> {
        self.check_time(current_time)?;
        for detection in detections {
            detection.validate()?;
        }

        // --- 1. Presence ---
        let present: HashSet<u64> = detections.iter().map(|d| d.track_id).collect();

        // --- 2. Open & Sustain ---
        let mut opened = Vec::new();
        for detection in detections {
            match self.open_windows.entry(detection.track_id) {
                Entry::Occupied(mut window) => window.get_mut().sustain(detection.confidence),
                Entry::Vacant(slot) => {
                    debug!(
                        track_id = detection.track_id,
                        class = %detection.class_label,
                        time = current_time,
                        "exposure window opened"
                    );
                    slot.insert(ExposureWindow::open(
                        detection.track_id,
                        &detection.class_label,
                        current_time,
                        detection.confidence,
                    ));
                    opened.push(WindowOpened {
                        track_id: detection.track_id,
                        class_label: detection.class_label.clone(),
                        time: current_time,
                    });
                }
            }
        }

        // --- 3. Close ---
        let lost: Vec<u64> = self
            .open_windows
            .keys()
            .filter(|id| !present.contains(*id))
            .copied()
            .collect();
        for track_id in lost {
            if let Some(window) = self.open_windows.remove(&track_id) {
                self.close_window(window, current_time);
            }
        }

        self.last_time = Some(current_time);

        for event in &opened {
            for hook in self.open_hooks.iter_mut() {
                hook(event);
            }
        }

        Ok(opened)
    }

    /// Closes every window that is still open, using `end_time` as their end.
    pub fn finalize(&mut self, end_time: f64) -> Result<()> {
        self.check_time(end_time)?;
        let still_open = std::mem::take(&mut self.open_windows);
        for window in still_open.into_values() {
            self.close_window(window, end_time);
        }
        self.last_time = Some(end_time);
        Ok(())
    }

    /// Clears all state, including the time cursor. Registered hooks are kept.
    pub fn reset(&mut self) {
        self.open_windows.clear();
        self.closed_intervals.clear();
        self.last_time = None;
    }

    pub fn closed_intervals(&self) -> &[ExposureInterval] {
        &self.closed_intervals
    }

    /// Hands the closed intervals to the caller, leaving the tracker's list empty.
    pub fn take_closed_intervals(&mut self) -> Vec<ExposureInterval> {
        std::mem::take(&mut self.closed_intervals)
    }

    pub fn open_windows(&self) -> impl Iterator<Item = &ExposureWindow> {
        self.open_windows.values()
    }

    pub fn is_open(&self, track_id: u64) -> bool {
        self.open_windows.contains_key(&track_id)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }

    fn check_time(&self, time: f64) -> Result<()> {
        let last = self.last_time.unwrap_or(f64::NEG_INFINITY);
        if !time.is_finite() || time < last {
            return Err(ExposureError::Sequence { last, current: time });
        }
        Ok(())
    }

    fn close_window(&mut self, window: ExposureWindow, end_time: f64) {
        let interval = window.close(end_time);
        debug!(
            track_id = interval.track_id,
            duration = interval.duration,
            "exposure window closed"
        );
        self.closed_intervals.push(interval);
    }
}
