#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::nms::non_max_suppression;
use crate::detect::result::{BBox, Detection};
use crate::frame::Frame;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single output of shape `[1, 4 + classes, anchors]` with
/// center-format boxes in model input pixels followed by per-class scores,
/// which is the layout of exported YOLOv8 detection heads. Frames are
/// stretched to the model input and boxes are scaled back to frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    labels: Vec<String>,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for `input_size` square input.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            labels: Vec::new(),
            iou_threshold: 0.45,
        })
    }

    /// Raw `names` entry from the model's ONNX metadata, as written by
    /// Ultralytics exports: `{0: 'fire', 1: 'smoke'}`.
    pub fn names_metadata<P: AsRef<Path>>(model_path: P) -> Result<Option<String>> {
        let model_path = model_path.as_ref();
        let proto = tract_onnx::onnx()
            .proto_model_for_path(model_path)
            .with_context(|| format!("failed to read ONNX metadata from {}", model_path.display()))?;
        Ok(proto
            .metadata_props
            .into_iter()
            .find(|prop| prop.key == "names")
            .map(|prop| prop.value))
    }

    /// Class names indexed by class id.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = imageops::resize(
            frame.image(),
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );
        let side = self.input_size as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn label_for(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [batch, 4 + classes, anchors]")?;
        let (_, rows, anchors) = view.dim();
        if rows <= 4 {
            return Err(anyhow!("model output has no class rows ({} rows)", rows));
        }

        let sx = frame.width() as f32 / self.input_size as f32;
        let sy = frame.height() as f32 / self.input_size as f32;

        let mut detections = Vec::new();
        for a in 0..anchors {
            let mut best = (0usize, f32::NEG_INFINITY);
            for c in 4..rows {
                let score = view[[0, c, a]];
                if score > best.1 {
                    best = (c - 4, score);
                }
            }
            let (class_id, confidence) = best;
            if !confidence.is_finite() || confidence < confidence_threshold {
                continue;
            }
            let bbox = BBox::from_cxcywh(
                view[[0, 0, a]] * sx,
                view[[0, 1, a]] * sy,
                view[[0, 2, a]] * sx,
                view[[0, 3, a]] * sy,
            )
            .clamped(frame.width(), frame.height());
            detections.push(Detection::new(self.label_for(class_id), confidence, bbox));
        }

        non_max_suppression(&mut detections, self.iou_threshold);
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame, confidence_threshold)
    }
}
