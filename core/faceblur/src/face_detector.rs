use image::DynamicImage;

use crate::error::Result;

/// Face rectangle as reported by a detector, in the pixel space of the image
/// the detector was given.
///
/// Coordinates follow the `(top, right, bottom, left)` convention; `right` and
/// `bottom` are exclusive. Detectors may report boxes that hang over the image
/// edges, so the fields are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// First row of the face (pixels).
    pub top: i32,
    /// Column just past the face (pixels).
    pub right: i32,
    /// Row just past the face (pixels).
    pub bottom: i32,
    /// First column of the face (pixels).
    pub left: i32,
}

impl BoundingBox {
    /// Build a box from its four edges.
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Build a box from a top-left corner and a size.
    pub fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            top: y,
            right: x.saturating_add_unsigned(width),
            bottom: y.saturating_add_unsigned(height),
            left: x,
        }
    }

    /// Multiply every coordinate by `factor`, mapping a box found on a
    /// downscaled image back to the full-resolution image.
    pub fn scaled(self, factor: u32) -> Self {
        let factor = i32::try_from(factor).unwrap_or(i32::MAX);
        Self {
            top: self.top.saturating_mul(factor),
            right: self.right.saturating_mul(factor),
            bottom: self.bottom.saturating_mul(factor),
            left: self.left.saturating_mul(factor),
        }
    }

    /// Clamp the box to a `width` x `height` image.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<Region> {
        let clamp = |v: i32, max: u32| v.max(0).unsigned_abs().min(max);
        let left = clamp(self.left, width);
        let right = clamp(self.right, width);
        let top = clamp(self.top, height);
        let bottom = clamp(self.bottom, height);

        if right <= left || bottom <= top {
            return None;
        }

        Some(Region {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}

/// Non-empty rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels, never zero.
    pub width: u32,
    /// Height in pixels, never zero.
    pub height: u32,
}

impl Region {
    /// Whether pixel `(x, y)` lies inside the region.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Pluggable face detection backend.
///
/// Implement this trait to plug a custom detector into
/// [`crate::FaceBlurrer`]. Returned boxes are in the coordinate space of
/// `image`.
pub trait FaceDetector: Send {
    /// Detect faces in `image`. An empty vector means no face was found.
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>>;
}

/// Upsample `image` by `2^times` with a bilinear filter.
///
/// Detectors use this to find faces smaller than their minimum window.
pub(crate) fn upsample(image: &DynamicImage, times: u32) -> DynamicImage {
    if times == 0 {
        return image.clone();
    }
    let factor = 1u32 << times;
    image.resize_exact(
        image.width().saturating_mul(factor),
        image.height().saturating_mul(factor),
        image::imageops::FilterType::Triangle,
    )
}

/// Map a box found on an image upsampled `times` times back to the original.
pub(crate) fn downsample_box(bbox: BoundingBox, times: u32) -> BoundingBox {
    if times == 0 {
        return bbox;
    }
    let factor = f64::from(1u32 << times);
    let shrink = |v: i32| (f64::from(v) / factor).round() as i32;
    BoundingBox {
        top: shrink(bbox.top),
        right: shrink(bbox.right),
        bottom: shrink(bbox.bottom),
        left: shrink(bbox.left),
    }
}
