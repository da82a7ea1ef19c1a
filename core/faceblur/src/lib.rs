//! Find faces in photographs and blur them.
//!
//! # Example
//!
//! ```no_run
//! use faceblur::{BlurParams, FaceBlurrer};
//!
//! let params = BlurParams {
//!     zoom_factor: 2,
//!     copy_when_no_face: true,
//!     ..BlurParams::default()
//! };
//! let mut blurrer = FaceBlurrer::from_model_dir(params, "model").unwrap();
//! let outcome = blurrer.blur_file("group.jpg", "group_blurred.jpg").unwrap();
//! println!("faces found: {}", outcome.faces_found());
//! ```
#![warn(missing_docs)]

/// Gaussian blur of rectangular image regions.
pub mod blur;
mod error;
/// Face detection trait and box geometry.
pub mod face_detector;
mod process;
#[cfg(feature = "rustface")]
/// SeetaFace cascade detector (`fast-geometric`).
pub mod rustface_backend;
#[cfg(feature = "neural")]
/// UltraFace ONNX detector (`neural`).
pub mod ultraface_backend;
/// Mirror a directory tree, blurring every recognized photo.
pub mod walk;

use std::fmt;
use std::path::Path;

pub use blur::BlurKernel;
/// Error type returned by faceblur operations.
pub use error::{FaceBlurError, Result};
pub use face_detector::{BoundingBox, FaceDetector, Region};
pub use process::downscale;
#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;
#[cfg(feature = "neural")]
pub use ultraface_backend::UltrafaceDetector;
pub use walk::{blur_all_photos, ErrorPolicy, WalkOptions, WalkSummary};

/// Largest accepted upsampling count. Each pass doubles both image axes.
pub const MAX_UPSAMPLING: u32 = 4;

/// Which detector to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionModel {
    /// Cascade over hand-crafted features. Fast, misses small or turned faces.
    FastGeometric,

    /// Convolutional network. Slower, more accurate.
    Neural,
}

impl Default for DetectionModel {
    /// `Neural` when it is compiled in, otherwise `FastGeometric`.
    fn default() -> Self {
        if cfg!(feature = "neural") {
            DetectionModel::Neural
        } else {
            DetectionModel::FastGeometric
        }
    }
}

impl fmt::Display for DetectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionModel::FastGeometric => f.write_str("fast-geometric"),
            DetectionModel::Neural => f.write_str("neural"),
        }
    }
}

/// Settings for one run. Built once, then passed by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurParams {
    /// Detector to use.
    pub model: DetectionModel,

    /// How many times the detector doubles the image before searching.
    /// Higher values find smaller faces and run slower.
    pub upsampling: u32,

    /// Divisor applied to both axes before detection. Boxes are scaled back
    /// up by the same factor. Must be at least 1.
    pub zoom_factor: u32,

    /// Gaussian kernel size. Must be odd.
    pub kernel_size: u32,

    /// Copy the source to the destination when no face is found.
    pub copy_when_no_face: bool,

    /// Quality for JPEG output, 1-100.
    pub jpeg_quality: u8,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            model: DetectionModel::default(),
            upsampling: 1,
            zoom_factor: 1,
            kernel_size: 21,
            copy_when_no_face: false,
            jpeg_quality: 95,
        }
    }
}

impl BlurParams {
    /// Check every field, reporting the first invalid one.
    pub fn validate(&self) -> Result<()> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(FaceBlurError::InvalidKernelSize(self.kernel_size));
        }
        if self.zoom_factor == 0 {
            return Err(FaceBlurError::InvalidZoomFactor(self.zoom_factor));
        }
        if self.upsampling > MAX_UPSAMPLING {
            return Err(FaceBlurError::InvalidUpsampling {
                got: self.upsampling,
                max: MAX_UPSAMPLING,
            });
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(FaceBlurError::InvalidQuality(self.jpeg_quality));
        }
        Ok(())
    }
}

/// What happened to one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurOutcome {
    /// Faces were found and the blurred photo was written.
    Blurred {
        /// Number of boxes the detector reported.
        faces: usize,
    },

    /// No face was found; the original was copied to the destination.
    Copied,

    /// No face was found and nothing was written.
    NoFace,
}

impl BlurOutcome {
    /// `true` when at least one face was found and blurred.
    pub fn faces_found(&self) -> bool {
        matches!(self, BlurOutcome::Blurred { .. })
    }
}

/// Load the built-in detector for `params.model` from `model_dir`.
#[cfg_attr(
    not(any(feature = "rustface", feature = "neural")),
    allow(unused_variables)
)]
pub fn load_detector(params: &BlurParams, model_dir: &Path) -> Result<Box<dyn FaceDetector>> {
    match params.model {
        #[cfg(feature = "rustface")]
        DetectionModel::FastGeometric => {
            let path = model_dir.join(rustface_backend::MODEL_FILE);
            Ok(Box::new(RustfaceDetector::from_file(&path, params.upsampling)?))
        }
        #[cfg(feature = "neural")]
        DetectionModel::Neural => {
            if params.upsampling > 0 {
                tracing::debug!("upsampling is ignored by the fixed-input neural model");
            }
            let path = model_dir.join(ultraface_backend::MODEL_FILE);
            Ok(Box::new(UltrafaceDetector::from_file(&path)?))
        }
        #[cfg(not(all(feature = "rustface", feature = "neural")))]
        other => Err(FaceBlurError::ModelUnavailable(other)),
    }
}

/// Blurs faces in photos with one detector and one set of parameters.
///
/// ```no_run
/// use faceblur::{BlurParams, BoundingBox, FaceBlurrer, FaceDetector};
///
/// struct Fixed;
/// impl FaceDetector for Fixed {
///     fn detect(&mut self, _image: &image::DynamicImage) -> faceblur::Result<Vec<BoundingBox>> {
///         Ok(vec![BoundingBox::new(10, 60, 60, 10)])
///     }
/// }
///
/// let mut blurrer = FaceBlurrer::new(BlurParams::default(), Box::new(Fixed)).unwrap();
/// blurrer.blur_file("in.png", "out.png").unwrap();
/// ```
pub struct FaceBlurrer {
    params: BlurParams,
    kernel: BlurKernel,
    detector: Box<dyn FaceDetector>,
}

impl FaceBlurrer {
    /// Validate `params` and pair them with a detector.
    pub fn new(params: BlurParams, detector: Box<dyn FaceDetector>) -> Result<Self> {
        params.validate()?;
        let kernel = BlurKernel::new(params.kernel_size)?;
        Ok(Self {
            params,
            kernel,
            detector,
        })
    }

    /// Validate `params` and load the built-in detector from `model_dir`.
    pub fn from_model_dir(params: BlurParams, model_dir: impl AsRef<Path>) -> Result<Self> {
        params.validate()?;
        let detector = load_detector(&params, model_dir.as_ref())?;
        Self::new(params, detector)
    }

    /// The parameters this blurrer runs with.
    pub fn params(&self) -> &BlurParams {
        &self.params
    }

    /// Blur every face in `src` and write the result to `dest`.
    ///
    /// When no face is found, `dest` receives a byte-for-byte copy of `src` if
    /// `copy_when_no_face` is set, and is left untouched otherwise.
    pub fn blur_file(
        &mut self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
    ) -> Result<BlurOutcome> {
        process::blur_pipeline(
            src.as_ref(),
            dest.as_ref(),
            &self.params,
            &self.kernel,
            self.detector.as_mut(),
        )
    }
}
