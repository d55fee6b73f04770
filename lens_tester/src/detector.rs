// THEORY:
// The detector is the expensive half of the detection source. It runs a YOLO
// model exported to ONNX through OpenCV's dnn module and returns class-labelled
// boxes for one frame, with no notion of identity. Identity is added afterwards,
// in frame order, by the `IdentityAssigner`.
//
// Ultralytics detection exports produce a single output of shape
// [1, 4 + classes, candidates]: rows 0..4 hold the box center and size in input
// pixels, the remaining rows hold one score per class.

use crate::video::SampledFrame;
use anyhow::{Context, Result, ensure};
use exposure_lens::ExposureError;
use exposure_lens::parallel_pipeline::FrameWorker;
use opencv::{
    core::{self, Mat, Scalar, Size, Vector},
    dnn,
    prelude::*,
};
use std::cmp::Ordering;
use std::path::Path;

/// An axis-aligned box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    pub fn to_rect(&self) -> core::Rect {
        core::Rect::new(
            self.x.round() as i32,
            self.y.round() as i32,
            self.width.round() as i32,
            self.height.round() as i32,
        )
    }
}

/// One detection before identity assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct DetectorSettings {
    pub input_size: i32,
    pub num_classes: usize,
    /// Minimum class score to keep a candidate.
    pub confidence: f32,
    pub nms_iou: f32,
}

pub struct YoloDetector {
    net: dnn::Net,
    settings: DetectorSettings,
}

impl YoloDetector {
    pub fn load(model_path: &Path, settings: DetectorSettings) -> Result<Self> {
        ensure!(settings.num_classes > 0, "at least one class name is required");
        ensure!(settings.input_size > 0, "model input size must be positive");
        let path = model_path
            .to_str()
            .context("model path is not valid UTF-8")?;
        let mut net = dnn::read_net_from_onnx(path)
            .with_context(|| format!("failed to load model {}", model_path.display()))?;
        net.set_preferable_backend(dnn::DNN_BACKEND_OPENCV)?;
        net.set_preferable_target(dnn::DNN_TARGET_CPU)?;
        Ok(Self { net, settings })
    }

    pub fn detect(&mut self, image: &Mat) -> Result<Vec<RawDetection>> {
        let size = self.settings.input_size;
        let blob = dnn::blob_from_image(
            image,
            1.0 / 255.0,
            Size::new(size, size),
            Scalar::default(),
            true,
            false,
            core::CV_32F,
        )
        .context("failed to build input blob")?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;

        let names = self.net.get_unconnected_out_layers_names()?;
        let mut outputs = Vector::<Mat>::new();
        self.net
            .forward(&mut outputs, &names)
            .context("model forward pass failed")?;
        let output = outputs.get(0).context("model produced no output")?;
        let data = output.data_typed::<f32>()?;

        let scale = (
            image.cols() as f32 / size as f32,
            image.rows() as f32 / size as f32,
        );
        let candidates = decode_predictions(data, self.settings.num_classes, scale, self.settings.confidence)?;
        Ok(non_max_suppression(candidates, self.settings.nms_iou))
    }
}

impl FrameWorker for YoloDetector {
    type Input = SampledFrame;
    type Output = (SampledFrame, Vec<RawDetection>);

    fn process(&mut self, frame: SampledFrame) -> exposure_lens::Result<Self::Output> {
        let detections = self
            .detect(&frame.image)
            .map_err(|e| ExposureError::Source(format!("frame {}: {e:#}", frame.index)))?;
        Ok((frame, detections))
    }
}

/// Decodes a flattened [4 + classes, candidates] prediction tensor.
pub fn decode_predictions(
    data: &[f32],
    num_classes: usize,
    scale: (f32, f32),
    threshold: f32,
) -> Result<Vec<RawDetection>> {
    let rows = 4 + num_classes;
    ensure!(
        !data.is_empty() && data.len() % rows == 0,
        "model output of {} values does not match {} classes",
        data.len(),
        num_classes
    );
    let candidates = data.len() / rows;
    let at = |row: usize, i: usize| data[row * candidates + i];

    let mut detections = Vec::new();
    for i in 0..candidates {
        let Some((class_id, score)) = (0..num_classes)
            .map(|c| (c, at(4 + c, i)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        else {
            continue;
        };
        if score < threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        detections.push(RawDetection {
            bbox: BoundingBox {
                x: (cx - w * 0.5) * scale.0,
                y: (cy - h * 0.5) * scale.1,
                width: w * scale.0,
                height: h * scale.1,
            },
            class_id,
            confidence: score,
        });
    }
    Ok(detections)
}

/// Greedy per-class non-maximum suppression.
pub fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));
    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
