use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{FaceBlurError, Result};
use crate::face_detector::{BoundingBox, FaceDetector};

/// File name of the UltraFace network inside the model directory.
pub const MODEL_FILE: &str = "version-RFB-320.onnx";

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;
const PIXEL_MEAN: f32 = 127.0;
const PIXEL_SCALE: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.7;
const IOU_THRESHOLD: f32 = 0.3;

/// Face detector backed by the UltraFace RFB-320 network, run through ONNX
/// Runtime. This is the `neural` model.
///
/// The network has a fixed 320x240 input, so every frame is resized to it and
/// boxes are mapped back to the caller's image size.
pub struct UltrafaceDetector {
    session: Session,
}

impl UltrafaceDetector {
    /// Load the UltraFace ONNX model from `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceBlurError::ModelLoad {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        let session = build_session(path).map_err(|e| FaceBlurError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::debug!("loaded UltraFace network from {}", path.display());
        Ok(Self { session })
    }
}

fn build_session(path: &Path) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(path)
}

impl FaceDetector for UltrafaceDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>> {
        let input = preprocess(image);
        // NCHW, matching INPUT_HEIGHT x INPUT_WIDTH.
        let tensor = Tensor::from_array((vec![1, 3, 240, 320], input))
            .map_err(|e| FaceBlurError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| FaceBlurError::Inference(e.to_string()))?;

        let (_, scores) = outputs["scores"]
            .try_extract_tensor::<f32>()
            .map_err(|e| FaceBlurError::Inference(e.to_string()))?;
        let (_, boxes) = outputs["boxes"]
            .try_extract_tensor::<f32>()
            .map_err(|e| FaceBlurError::Inference(e.to_string()))?;

        let candidates = collect_candidates(scores, boxes, SCORE_THRESHOLD);
        let kept = non_max_suppression(candidates, IOU_THRESHOLD);

        let (w, h) = (image.width() as f32, image.height() as f32);
        Ok(kept
            .iter()
            .map(|c| BoundingBox {
                top: (c.y1 * h).round() as i32,
                right: (c.x2 * w).round() as i32,
                bottom: (c.y2 * h).round() as i32,
                left: (c.x1 * w).round() as i32,
            })
            .collect())
    }
}

/// Resize to the network input and lay the pixels out as normalized NCHW.
fn preprocess(image: &DynamicImage) -> Vec<f32> {
    let resized = image
        .resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle)
        .to_rgb8();
    let plane = (INPUT_WIDTH * INPUT_HEIGHT) as usize;
    let mut data = vec![0f32; plane * 3];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (f32::from(pixel.0[c]) - PIXEL_MEAN) / PIXEL_SCALE;
        }
    }
    data
}

/// Candidate face in normalized corner form.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = iw * ih;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// `scores` is `[N, 2]` (background, face); `boxes` is `[N, 4]`.
fn collect_candidates(scores: &[f32], boxes: &[f32], threshold: f32) -> Vec<Candidate> {
    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(s, _)| s[1] > threshold)
        .map(|(s, b)| Candidate {
            x1: b[0].clamp(0.0, 1.0),
            y1: b[1].clamp(0.0, 1.0),
            x2: b[2].clamp(0.0, 1.0),
            y2: b[3].clamp(0.0, 1.0),
            score: s[1],
        })
        .collect()
}

/// Greedy NMS: keep the best-scoring candidate, drop anything overlapping it.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) < iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
