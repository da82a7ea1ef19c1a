use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::DynamicImage;

use crate::error::{FaceBlurError, Result};
use crate::face_detector::{downsample_box, upsample, BoundingBox, FaceDetector};

/// File name of the SeetaFace frontal model inside the model directory.
pub const MODEL_FILE: &str = "seeta_fd_frontal_v1.0.bin";

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// This is the `fast-geometric` model: a funnel-structured cascade over
/// hand-crafted features, running on a grayscale copy of the image.
pub struct RustfaceDetector {
    model: rustface::Model,
    upsampling: u32,
}

impl RustfaceDetector {
    /// Load the SeetaFace model from `path`.
    pub fn from_file(path: &Path, upsampling: u32) -> Result<Self> {
        let file = File::open(path).map_err(|e| FaceBlurError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let model =
            rustface::read_model(BufReader::new(file)).map_err(|e| FaceBlurError::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        tracing::debug!("loaded SeetaFace model from {}", path.display());
        Ok(Self { model, upsampling })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>> {
        let search = upsample(image, self.upsampling);
        let gray = search.to_luma8();
        let (width, height) = (gray.width(), gray.height());

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(20);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                tracing::debug!(
                    "seetaface hit score={:.2} at ({}, {}, {}x{})",
                    face.score(),
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height()
                );
                let found =
                    BoundingBox::from_xywh(bbox.x(), bbox.y(), bbox.width(), bbox.height());
                downsample_box(found, self.upsampling)
            })
            .collect())
    }
}
