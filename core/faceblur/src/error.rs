use std::path::PathBuf;

use thiserror::Error;

use crate::DetectionModel;

#[derive(Debug, Error)]
pub enum FaceBlurError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image dimensions are zero")]
    ZeroDimensions,

    #[error("{0} is not an odd int value")]
    InvalidKernelSize(u32),

    #[error("zoom factor must be >= 1, got {0}")]
    InvalidZoomFactor(u32),

    #[error("upsampling must be between 0 and {max}, got {got}")]
    InvalidUpsampling { got: u32, max: u32 },

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("failed to load face detection model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("the {0} model is not compiled into this build")]
    ModelUnavailable(DetectionModel),

    #[error("face detection inference failed: {0}")]
    Inference(String),

    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, FaceBlurError>;
