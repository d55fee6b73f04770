// THEORY:
// The `report` module packages the merged exposures into the single data
// structure that every downstream consumer (text tables, timeline chart, JSON
// export) reads. It is pure data: formatting and rendering live elsewhere.

use crate::core_modules::categorizer::{CategoryThresholds, TacticalCategory};
use crate::core_modules::exposure_window::MergedInterval;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One merged exposure with its tactical classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureEntry {
    #[serde(flatten)]
    pub interval: MergedInterval,
    pub category: TacticalCategory,
    /// Whether the class label marks a head (partial target) detection.
    pub is_head: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExposureSummary {
    pub distinct_targets: usize,
    pub exposure_events: usize,
    /// Closed intervals before merging.
    pub raw_fragments: usize,
    pub total_exposed_seconds: f64,
    pub category_counts: BTreeMap<TacticalCategory, usize>,
}

/// The final output of an analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExposureReport {
    /// Merged exposures, grouped by track id and time-ordered within each id.
    pub exposures: Vec<ExposureEntry>,
    pub summary: ExposureSummary,
}

impl ExposureReport {
    pub fn build(
        merged: Vec<MergedInterval>,
        raw_fragments: usize,
        thresholds: &CategoryThresholds,
        head_marker: &str,
    ) -> Self {
        let marker = head_marker.to_uppercase();
        let exposures: Vec<ExposureEntry> = merged
            .into_iter()
            .map(|interval| ExposureEntry {
                category: thresholds.categorize(interval.duration),
                is_head: !marker.is_empty() && interval.class_label.to_uppercase().contains(&marker),
                interval,
            })
            .collect();

        let distinct_targets = exposures
            .iter()
            .map(|e| e.interval.track_id)
            .collect::<BTreeSet<_>>()
            .len();
        let mut category_counts: BTreeMap<TacticalCategory, usize> =
            TacticalCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for entry in &exposures {
            *category_counts.entry(entry.category).or_insert(0) += 1;
        }

        let summary = ExposureSummary {
            distinct_targets,
            exposure_events: exposures.len(),
            raw_fragments,
            total_exposed_seconds: exposures.iter().map(|e| e.interval.duration).sum(),
            category_counts,
        };

        Self { exposures, summary }
    }

    pub fn is_empty(&self) -> bool {
        self.exposures.is_empty()
    }

    /// Full-target exposures.
    pub fn body(&self) -> impl Iterator<Item = &ExposureEntry> {
        self.exposures.iter().filter(|e| !e.is_head)
    }

    /// Partial-target (head) exposures.
    pub fn head(&self) -> impl Iterator<Item = &ExposureEntry> {
        self.exposures.iter().filter(|e| e.is_head)
    }

    pub fn intervals(&self) -> impl Iterator<Item = &MergedInterval> {
        self.exposures.iter().map(|e| &e.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(track_id: u64, class_label: &str, start: f64, end: f64) -> MergedInterval {
        MergedInterval {
            track_id,
            class_label: class_label.to_owned(),
            start_time: start,
            end_time: end,
            duration: end - start,
            peak_confidence: 0.9,
        }
    }

    #[test]
    fn splits_head_and_body_case_insensitively() {
        let report = ExposureReport::build(
            vec![
                merged(1, "T", 0.0, 1.5),
                merged(2, "ct_head", 0.0, 0.1),
                merged(3, "T_HEAD", 2.0, 2.5),
            ],
            5,
            &CategoryThresholds::default(),
            "HEAD",
        );

        let body: Vec<u64> = report.body().map(|e| e.interval.track_id).collect();
        let head: Vec<u64> = report.head().map(|e| e.interval.track_id).collect();
        assert_eq!(body, vec![1]);
        assert_eq!(head, vec![2, 3]);
    }

    #[test]
    fn summarizes_targets_and_categories() {
        let report = ExposureReport::build(
            vec![
                merged(1, "T", 0.0, 1.5),
                merged(1, "T", 3.0, 3.1),
                merged(4, "CT", 0.0, 0.5),
            ],
            7,
            &CategoryThresholds::default(),
            "HEAD",
        );

        let summary = &report.summary;
        assert_eq!(summary.distinct_targets, 2);
        assert_eq!(summary.exposure_events, 3);
        assert_eq!(summary.raw_fragments, 7);
        assert!((summary.total_exposed_seconds - 2.1).abs() < 1e-9);
        assert_eq!(summary.category_counts[&TacticalCategory::FlashNoise], 1);
        assert_eq!(summary.category_counts[&TacticalCategory::Standard], 1);
        assert_eq!(summary.category_counts[&TacticalCategory::HighVulnerability], 1);
    }

    #[test]
    fn empty_report() {
        let report = ExposureReport::build(Vec::new(), 0, &CategoryThresholds::default(), "HEAD");
        assert!(report.is_empty());
        assert_eq!(report.summary.distinct_targets, 0);
        assert_eq!(report.summary.category_counts.len(), 3);
    }
}
