use image::{imageops, ImageBuffer, Pixel, Rgba, Rgba32FImage};
use imageproc::filter::separable_filter_equal;

use crate::error::{FaceBlurError, Result};
use crate::face_detector::Region;

/// Separable Gaussian kernel with an explicit odd size.
#[derive(Debug, Clone)]
pub struct BlurKernel {
    size: u32,
    weights: Vec<f32>,
}

impl BlurKernel {
    /// Build a kernel of `size` taps. Sigma is derived from the size.
    pub fn new(size: u32) -> Result<Self> {
        if size == 0 || size % 2 == 0 {
            return Err(FaceBlurError::InvalidKernelSize(size));
        }

        let sigma = sigma_for_size(size);
        let radius = (size / 2) as f64;
        let mut weights: Vec<f64> = (0..size)
            .map(|i| {
                let d = i as f64 - radius;
                (-(d * d) / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }

        Ok(Self {
            size,
            weights: weights.into_iter().map(|w| w as f32).collect(),
        })
    }

    /// Number of taps.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Normalized tap weights, summing to 1.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Sigma used when only a kernel size is given.
pub fn sigma_for_size(size: u32) -> f64 {
    0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Blur `region` of `image` in place.
///
/// The region is treated as a standalone image: samples past its edges are
/// reflected back inside it (`dcb|abcd|cba`), so pixels outside the region
/// neither change nor bleed in.
pub fn blur_region<P>(image: &mut ImageBuffer<P, Vec<u8>>, region: Region, kernel: &BlurKernel)
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if region.width == 0 || region.height == 0 || kernel.size() == 1 {
        return;
    }

    let mut sub =
        imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();

    // imageproc clamps at the borders, so pad by the kernel radius first.
    // Working in f32 keeps rounding out of the intermediate pass.
    let pad = kernel.size() / 2;
    let padded = Rgba32FImage::from_fn(region.width + 2 * pad, region.height + 2 * pad, |x, y| {
        let sx = reflect_101(x as isize - pad as isize, region.width as usize);
        let sy = reflect_101(y as isize - pad as isize, region.height as usize);
        let mut texel = [0.0; 4];
        for (t, v) in texel
            .iter_mut()
            .zip(sub.get_pixel(sx as u32, sy as u32).channels())
        {
            *t = f32::from(*v);
        }
        Rgba(texel)
    });
    let filtered = separable_filter_equal(&padded, kernel.weights());

    for (x, y, pixel) in sub.enumerate_pixels_mut() {
        let texel = filtered.get_pixel(x + pad, y + pad).0;
        for (v, t) in pixel.channels_mut().iter_mut().zip(texel) {
            *v = t.round().clamp(0.0, 255.0) as u8;
        }
    }

    imageops::replace(image, &sub, i64::from(region.x), i64::from(region.y));
}

/// Reflect an out-of-range index back into `0..len` without repeating the
/// edge sample.
fn reflect_101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}
