// THEORY:
// The `IdentityAssigner` adds "object permanence" to raw detections. It matches
// each frame's boxes against the targets it is already following and hands out
// persistent track ids, which is what the exposure engine keys its windows on.
//
// Key principles:
// 1.  **Prediction**: each target remembers its last velocity, so the match is
//     made against where the target should be now, not where it was.
// 2.  **Greedy Association**: all (target, detection) pairs within the distance
//     limit are ranked by distance and taken closest-first.
// 3.  **Coasting**: a target that is not matched is kept for a few frames before
//     it is forgotten, so a one-frame miss does not mint a new id. The exposure
//     engine still sees the miss (the target is absent from that frame's
//     detections); only the id survives.
// 4.  **Class Agnostic**: a target may change class between frames (body to
//     head, or a misclassification). The id is kept; the engine decides which
//     label counts.

use crate::detector::{BoundingBox, RawDetection};
use exposure_lens::{Detection, DetectionSource, ExposureError};
use std::cmp::Ordering;
use std::collections::HashSet;

pub const DEFAULT_MAX_FRAMES_SINCE_SEEN: u32 = 5;

/// A target followed across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
    pub id: u64,
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub confidence: f32,
    /// Center displacement per sampled frame.
    pub velocity: (f32, f32),
    /// Number of frames this target has been matched.
    pub age: u32,
    pub frames_since_seen: u32,
}

impl TrackedTarget {
    fn new(id: u64, detection: &RawDetection) -> Self {
        Self {
            id,
            bbox: detection.bbox,
            class_id: detection.class_id,
            confidence: detection.confidence,
            velocity: (0.0, 0.0),
            age: 1,
            frames_since_seen: 0,
        }
    }

    fn update(&mut self, detection: &RawDetection) {
        let (old_x, old_y) = self.bbox.center();
        let (new_x, new_y) = detection.bbox.center();
        let frames = (self.frames_since_seen + 1) as f32;
        self.velocity = ((new_x - old_x) / frames, (new_y - old_y) / frames);
        self.bbox = detection.bbox;
        self.class_id = detection.class_id;
        self.confidence = detection.confidence;
        self.age += 1;
        self.frames_since_seen = 0;
    }

    fn predict_center(&self) -> (f32, f32) {
        let (x, y) = self.bbox.center();
        let frames = (self.frames_since_seen + 1) as f32;
        (x + self.velocity.0 * frames, y + self.velocity.1 * frames)
    }
}

pub struct IdentityAssigner {
    targets: Vec<TrackedTarget>,
    next_id: u64,
    /// Max center distance, in pixels, for a detection to continue a target.
    max_distance: f32,
    max_frames_since_seen: u32,
    class_names: Vec<String>,
}

impl IdentityAssigner {
    pub fn new(class_names: Vec<String>, max_distance: f32, max_frames_since_seen: u32) -> Self {
        Self {
            targets: Vec::new(),
            next_id: 1,
            max_distance,
            max_frames_since_seen,
            class_names,
        }
    }

    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.class_names.get(class_id).map(String::as_str)
    }

    /// Targets matched in the latest frame, in ascending id order.
    pub fn visible(&self) -> Vec<&TrackedTarget> {
        let mut visible: Vec<&TrackedTarget> = self.targets.iter().filter(|t| t.frames_since_seen == 0).collect();
        visible.sort_by_key(|t| t.id);
        visible
    }

    /// Associates one frame's detections with known targets.
    pub fn update(&mut self, detections: &[RawDetection]) {
        // --- 1. Candidate Pairs ---
        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (ti, target) in self.targets.iter().enumerate() {
            let (px, py) = target.predict_center();
            for (di, detection) in detections.iter().enumerate() {
                let (dx, dy) = detection.bbox.center();
                let distance = ((px - dx).powi(2) + (py - dy).powi(2)).sqrt();
                if distance <= self.max_distance {
                    pairs.push((distance, ti, di));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        // --- 2. Greedy Matching ---
        let mut matched_targets: HashSet<usize> = HashSet::new();
        let mut matched_detections: HashSet<usize> = HashSet::new();
        for (_, ti, di) in pairs {
            if matched_targets.contains(&ti) || matched_detections.contains(&di) {
                continue;
            }
            self.targets[ti].update(&detections[di]);
            matched_targets.insert(ti);
            matched_detections.insert(di);
        }

        // --- 3. Occlusion & Death ---
        for (ti, target) in self.targets.iter_mut().enumerate() {
            if !matched_targets.contains(&ti) {
                target.frames_since_seen += 1;
            }
        }
        let max_missing = self.max_frames_since_seen;
        self.targets.retain(|t| t.frames_since_seen <= max_missing);

        // --- 4. Birth ---
        for (di, detection) in detections.iter().enumerate() {
            if !matched_detections.contains(&di) {
                self.targets.push(TrackedTarget::new(self.next_id, detection));
                self.next_id += 1;
            }
        }
    }
}

impl DetectionSource for IdentityAssigner {
    type Frame = Vec<RawDetection>;

    fn detect(&mut self, frame: &Vec<RawDetection>) -> exposure_lens::Result<Vec<Detection>> {
        self.update(frame);
        self.visible()
            .into_iter()
            .map(|target| {
                let class_label = self.class_name(target.class_id).ok_or_else(|| {
                    ExposureError::Input(format!("model produced unknown class id {}", target.class_id))
                })?;
                Ok(Detection::new(
                    target.id,
                    class_label,
                    f64::from(target.confidence).clamp(0.0, 1.0),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(x: f32, y: f32, class_id: usize) -> RawDetection {
        RawDetection {
            bbox: BoundingBox { x, y, width: 20.0, height: 40.0 },
            class_id,
            confidence: 0.8,
        }
    }

    fn labels(detections: &[Detection]) -> Vec<(u64, String)> {
        detections.iter().map(|d| (d.track_id, d.class_label.clone())).collect()
    }

    fn assigner() -> IdentityAssigner {
        IdentityAssigner::new(vec!["CT".into(), "T".into()], 30.0, 2)
    }

    #[test]
    fn keeps_ids_for_moving_targets() {
        let mut ids = assigner();
        let first = ids.detect(&vec![raw(0.0, 0.0, 1), raw(200.0, 0.0, 0)]).unwrap();
        let second = ids.detect(&vec![raw(210.0, 0.0, 0), raw(10.0, 0.0, 1)]).unwrap();
        let third = ids.detect(&vec![raw(20.0, 0.0, 1), raw(220.0, 0.0, 0)]).unwrap();

        assert_eq!(labels(&first), vec![(1, "T".to_string()), (2, "CT".to_string())]);
        assert_eq!(labels(&second), labels(&first));
        assert_eq!(labels(&third), labels(&first));
    }

    #[test]
    fn coasts_through_short_misses_then_forgets() {
        let mut ids = assigner();
        ids.detect(&vec![raw(0.0, 0.0, 1)]).unwrap();
        assert!(ids.detect(&vec![]).unwrap().is_empty());
        let back = ids.detect(&vec![raw(0.0, 0.0, 1)]).unwrap();
        assert_eq!(back[0].track_id, 1);

        for _ in 0..3 {
            ids.detect(&vec![]).unwrap();
        }
        let reborn = ids.detect(&vec![raw(0.0, 0.0, 1)]).unwrap();
        assert_eq!(reborn[0].track_id, 2);
    }

    #[test]
    fn distant_detection_gets_a_new_id() {
        let mut ids = assigner();
        ids.detect(&vec![raw(0.0, 0.0, 0)]).unwrap();
        let far = ids.detect(&vec![raw(500.0, 0.0, 0)]).unwrap();
        assert_eq!(far[0].track_id, 2);
    }

    #[test]
    fn class_changes_keep_the_id() {
        let mut ids = assigner();
        ids.detect(&vec![raw(0.0, 0.0, 1)]).unwrap();
        let relabelled = ids.detect(&vec![raw(2.0, 0.0, 0)]).unwrap();
        assert_eq!(relabelled[0].track_id, 1);
        assert_eq!(relabelled[0].class_label, "CT");
    }

    #[test]
    fn unknown_class_is_an_input_error() {
        let mut ids = assigner();
        assert!(matches!(
            ids.detect(&vec![raw(0.0, 0.0, 7)]),
            Err(ExposureError::Input(_))
        ));
    }
}
