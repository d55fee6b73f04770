// THEORY:
// Detectors blink. A target that stays on-screen for two seconds often comes out
// of the tracker as several short intervals separated by one or two missed
// frames. The `merger` coalesces such fragments back into one exposure.
//
// Algorithm:
// 1.  Stable-sort all intervals by (track id, start time).
// 2.  Walk the sorted list keeping a "current" interval. A following interval of
//     the same id whose start lies within `gap_threshold` of the current end is
//     absorbed: the end is extended, the class label of the earliest fragment
//     is kept. Anything else flushes the current interval and starts a new one.
//
// The output is grouped by track id, time-ordered within each group, and no two
// intervals of the same id are separated by a gap <= the threshold. Merging an
// already merged list with the same threshold returns it unchanged.

use crate::core_modules::exposure_window::{ExposureInterval, MergedInterval};
use crate::error::{ExposureError, Result};
use tracing::debug;

pub const DEFAULT_GAP_THRESHOLD: f64 = 0.5;

/// The largest gap, in seconds, between two fragments of one track id that still
/// counts as a single exposure. Always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct GapThreshold(f64);

impl GapThreshold {
    pub fn new(seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ExposureError::Configuration(format!(
                "gap threshold must be a finite, non-negative number of seconds (got {seconds})"
            )));
        }
        Ok(Self(seconds))
    }

    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl Default for GapThreshold {
    fn default() -> Self {
        Self(DEFAULT_GAP_THRESHOLD)
    }
}

/// Merges fragmented intervals of the same track id.
pub fn merge(intervals: &[ExposureInterval], gap_threshold: GapThreshold) -> Vec<MergedInterval> {
    let mut sorted: Vec<&ExposureInterval> = intervals.iter().collect();
    sorted.sort_by(|a, b| {
        a.track_id
            .cmp(&b.track_id)
            .then(a.start_time.total_cmp(&b.start_time))
    });

    let mut sorted = sorted.into_iter();
    let Some(first) = sorted.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    let mut current = first.clone();
    for next in sorted {
        let same_target = next.track_id == current.track_id;
        if same_target && next.start_time - current.end_time <= gap_threshold.seconds() {
            current.end_time = current.end_time.max(next.end_time);
            current.duration = current.end_time - current.start_time;
            current.peak_confidence = current.peak_confidence.max(next.peak_confidence);
        } else {
            merged.push(current);
            current = next.clone();
        }
    }
    merged.push(current);

    debug!(
        fragments = intervals.len(),
        merged = merged.len(),
        gap = gap_threshold.seconds(),
        "merged exposure fragments"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(track_id: u64, class_label: &str, start: f64, end: f64) -> ExposureInterval {
        ExposureInterval {
            track_id,
            class_label: class_label.to_owned(),
            start_time: start,
            end_time: end,
            duration: end - start,
            peak_confidence: 0.7,
        }
    }

    fn gap(seconds: f64) -> GapThreshold {
        GapThreshold::new(seconds).unwrap()
    }

    fn covered(intervals: &[MergedInterval]) -> f64 {
        intervals.iter().map(|i| i.duration).sum()
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(merge(&[], GapThreshold::default()).is_empty());
    }

    #[test]
    fn single_interval_is_unchanged() {
        let only = interval(3, "CT", 1.0, 2.5);
        assert_eq!(merge(std::slice::from_ref(&only), gap(0.5)), vec![only]);
    }

    #[test]
    fn merges_within_threshold_only() {
        let fragments = [interval(7, "T", 0.0, 0.3), interval(7, "T", 0.6, 0.9)];

        let merged = merge(&fragments, gap(0.5));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_time, 0.0);
        assert_eq!(merged[0].end_time, 0.9);
        assert!((merged[0].duration - 0.9).abs() < 1e-12);

        assert_eq!(merge(&fragments, gap(0.2)).len(), 2);
    }

    #[test]
    fn earliest_fragment_label_wins() {
        let fragments = [interval(1, "CT", 1.3, 1.4), interval(1, "T", 0.0, 1.0)];
        let merged = merge(&fragments, gap(0.5));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].class_label, "T");
        assert_eq!(merged[0].end_time, 1.4);
    }

    #[test]
    fn different_ids_never_merge() {
        let fragments = [interval(1, "T", 0.0, 1.0), interval(2, "T", 1.0, 2.0)];
        assert_eq!(merge(&fragments, gap(10.0)).len(), 2);
    }

    #[test]
    fn contained_fragment_does_not_shrink_end() {
        let fragments = [interval(4, "T", 0.0, 3.0), interval(4, "T", 1.0, 1.5)];
        let merged = merge(&fragments, gap(0.0));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].end_time, 3.0);
    }

    #[test]
    fn zero_gap_merges_adjacent_but_not_separated() {
        let adjacent = [interval(2, "T", 0.0, 1.0), interval(2, "T", 1.0, 2.0)];
        assert_eq!(merge(&adjacent, gap(0.0)).len(), 1);

        let separated = [interval(2, "T", 0.0, 1.0), interval(2, "T", 1.05, 2.0)];
        assert_eq!(merge(&separated, gap(0.0)).len(), 2);
    }

    #[test]
    fn output_is_grouped_by_id_and_time_ordered() {
        let fragments = [
            interval(9, "T", 5.0, 6.0),
            interval(2, "CT", 3.0, 3.5),
            interval(9, "T", 0.0, 1.0),
            interval(2, "CT", 0.0, 0.2),
        ];
        let merged = merge(&fragments, gap(0.5));
        let keys: Vec<(u64, f64)> = merged.iter().map(|i| (i.track_id, i.start_time)).collect();
        assert_eq!(keys, vec![(2, 0.0), (2, 3.0), (9, 0.0), (9, 5.0)]);
    }

    #[test]
    fn peak_confidence_is_the_group_maximum() {
        let mut strong = interval(5, "T", 0.4, 0.8);
        strong.peak_confidence = 0.95;
        let merged = merge(&[interval(5, "T", 0.0, 0.3), strong], gap(0.5));
        assert_eq!(merged[0].peak_confidence, 0.95);
    }

    #[test]
    fn merging_is_idempotent() {
        let fragments = [
            interval(1, "T", 0.0, 0.4),
            interval(1, "T", 0.7, 1.2),
            interval(1, "T", 2.0, 2.1),
            interval(3, "CT_HEAD", 0.1, 0.2),
            interval(3, "CT", 0.5, 0.9),
        ];
        let once = merge(&fragments, gap(0.5));
        let twice = merge(&once, gap(0.5));
        assert_eq!(once, twice);
    }

    #[test]
    fn larger_gap_never_adds_intervals_or_loses_coverage() {
        let fragments = [
            interval(1, "T", 0.0, 0.2),
            interval(1, "T", 0.3, 0.5),
            interval(1, "T", 1.0, 1.1),
            interval(1, "T", 2.5, 3.0),
            interval(2, "CT", 0.0, 0.1),
            interval(2, "CT", 0.9, 1.0),
        ];
        let mut previous: Option<Vec<MergedInterval>> = None;
        for seconds in [0.0, 0.1, 0.25, 0.5, 0.8, 1.5, 5.0] {
            let merged = merge(&fragments, gap(seconds));
            if let Some(prev) = &previous {
                assert!(merged.len() <= prev.len(), "gap {seconds}");
                assert!(covered(&merged) + 1e-9 >= covered(prev), "gap {seconds}");
            }
            previous = Some(merged);
        }
    }

    #[test]
    fn rejects_invalid_thresholds() {
        for bad in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                GapThreshold::new(bad),
                Err(ExposureError::Configuration(_))
            ));
        }
        assert_eq!(GapThreshold::default().seconds(), 0.5);
    }
}
