use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{
    DynamicImage, GenericImageView, ImageEncoder, ImageFormat, ImageReader, RgbImage, RgbaImage,
};

use crate::blur::{blur_region, BlurKernel};
use crate::error::{FaceBlurError, Result};
use crate::face_detector::{FaceDetector, Region};
use crate::{BlurOutcome, BlurParams};

/// Decode the image at `path` at full resolution.
///
/// The format is sniffed from the file's bytes, so a mislabeled or
/// extension-less photo still decodes.
pub(crate) fn decode_image(path: &Path) -> Result<DynamicImage> {
    let io_err = |source| FaceBlurError::Io {
        path: path.to_path_buf(),
        source,
    };
    let image = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .decode()
        .map_err(|source| FaceBlurError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(FaceBlurError::ZeroDimensions);
    }
    Ok(image)
}

/// Dimensions of the detection copy for a `zoom` downscale.
pub(crate) fn downscaled_size(width: u32, height: u32, zoom: u32) -> (u32, u32) {
    let shrink = |v: u32| ((f64::from(v) / f64::from(zoom)).round() as u32).max(1);
    (shrink(width), shrink(height))
}

/// Shrink the image by `1/zoom` on both axes for faster detection.
///
/// Each side becomes `round(side / zoom)`, never less than 1. This is the
/// image the detector sees when a photo is blurred with that zoom factor.
pub fn downscale(image: &DynamicImage, zoom: u32) -> DynamicImage {
    if zoom <= 1 {
        return image.clone();
    }
    let (w, h) = downscaled_size(image.width(), image.height(), zoom);
    image.resize_exact(w, h, FilterType::Triangle)
}

/// Working buffer for blurring. Alpha is kept when the source has it.
pub(crate) fn to_canvas(image: DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.into_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.into_rgb8())
    }
}

/// Blur every region of `canvas` in place.
pub(crate) fn blur_regions(canvas: &mut DynamicImage, regions: &[Region], kernel: &BlurKernel) {
    match canvas {
        DynamicImage::ImageRgba8(buffer) => {
            for region in regions {
                blur_region(buffer, *region, kernel);
            }
        }
        DynamicImage::ImageRgb8(buffer) => {
            for region in regions {
                blur_region(buffer, *region, kernel);
            }
        }
        other => {
            let mut buffer = other.to_rgb8();
            for region in regions {
                blur_region(&mut buffer, *region, kernel);
            }
            *other = DynamicImage::ImageRgb8(buffer);
        }
    }
}

/// Flatten alpha channel by compositing onto a white background.
pub(crate) fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    let rgba: RgbaImage = image.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    let mut rgb = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let out_r = (r as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        let out_g = (g as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        let out_b = (b as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([out_r, out_g, out_b]));
    }

    rgb
}

/// Encode `image` to `path`, picking the format from the extension.
///
/// JPEG output honours `quality` and drops alpha by compositing over white.
pub(crate) fn encode_image(image: &DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let encode_err = |source| FaceBlurError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let format = ImageFormat::from_path(path).map_err(encode_err)?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = if image.color().has_alpha() {
                flatten_alpha(image)
            } else {
                image.to_rgb8()
            };
            let file = File::create(path).map_err(|source| FaceBlurError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
            encoder
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(encode_err)
        }
        other => image.save_with_format(path, other).map_err(encode_err),
    }
}

/// Copy `src` to `dest` byte for byte.
///
/// When both paths name the same file there is nothing to do; copying would
/// truncate the source before reading it.
pub(crate) fn copy_original(src: &Path, dest: &Path) -> Result<()> {
    if same_file(src, dest) {
        tracing::info!("{} is its own destination, left as is", src.display());
        return Ok(());
    }
    std::fs::copy(src, dest).map_err(|source| FaceBlurError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Whether `a` and `b` resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Full pipeline: decode → downscale → detect → blur → encode.
pub(crate) fn blur_pipeline(
    src: &Path,
    dest: &Path,
    params: &BlurParams,
    kernel: &BlurKernel,
    detector: &mut dyn FaceDetector,
) -> Result<BlurOutcome> {
    tracing::info!("{}: processing...", src.display());

    let decoded = decode_image(src)?;
    let small = downscale(&decoded, params.zoom_factor);
    tracing::debug!(
        "{}: detecting on {}x{} (zoom {})",
        src.display(),
        small.width(),
        small.height(),
        params.zoom_factor
    );

    let boxes = detector.detect(&small)?;

    if boxes.is_empty() {
        tracing::info!("{}: there are no faces", src.display());
        if params.copy_when_no_face {
            copy_original(src, dest)?;
            tracing::info!("original photo has been saved in {}", dest.display());
            return Ok(BlurOutcome::Copied);
        }
        return Ok(BlurOutcome::NoFace);
    }

    tracing::info!(
        "{}: there are {} faces at {:?}",
        src.display(),
        boxes.len(),
        boxes
    );

    let (width, height) = decoded.dimensions();
    let regions: Vec<Region> = boxes
        .iter()
        .filter_map(|b| b.scaled(params.zoom_factor).clamp_to(width, height))
        .collect();

    let mut canvas = to_canvas(decoded);
    blur_regions(&mut canvas, &regions, kernel);
    encode_image(&canvas, dest, params.jpeg_quality)?;

    tracing::info!("face blurred photo has been saved in {}", dest.display());

    Ok(BlurOutcome::Blurred { faces: boxes.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    fn make_test_rgb(width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ]);
        }
        img
    }

    #[test]
    fn downscaled_size_rounds_and_never_hits_zero() {
        assert_eq!(downscaled_size(200, 100, 1), (200, 100));
        assert_eq!(downscaled_size(200, 100, 4), (50, 25));
        assert_eq!(downscaled_size(101, 75, 2), (51, 38));
        assert_eq!(downscaled_size(3, 3, 10), (1, 1));
    }

    #[test]
    fn downscale_with_zoom_one_keeps_size() {
        let img = DynamicImage::ImageRgb8(make_test_rgb(40, 30));
        let small = downscale(&img, 1);
        assert_eq!(small.dimensions(), (40, 30));
    }

    #[test]
    fn downscale_shrinks_both_axes() {
        let img = DynamicImage::ImageRgb8(make_test_rgb(40, 30));
        let small = downscale(&img, 3);
        assert_eq!(small.dimensions(), (13, 10));
    }

    #[test]
    fn downscale_rounds_odd_sides() {
        let img = DynamicImage::ImageRgb8(make_test_rgb(101, 75));
        assert_eq!(downscale(&img, 2).dimensions(), (51, 38));
    }

    #[test]
    fn canvas_keeps_alpha_only_when_present() {
        let rgb = to_canvas(DynamicImage::new_rgb8(2, 2));
        assert!(matches!(rgb, DynamicImage::ImageRgb8(_)));
        let rgba = to_canvas(DynamicImage::new_rgba8(2, 2));
        assert!(matches!(rgba, DynamicImage::ImageRgba8(_)));
        let luma = to_canvas(DynamicImage::new_luma8(2, 2));
        assert!(matches!(luma, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn flatten_alpha_composites_over_white() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([255, 0, 0, 0]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn flatten_alpha_preserves_opaque() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([100, 150, 200, 255]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([100, 150, 200]));
    }

    #[test]
    fn encode_jpeg_produces_valid_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let rgba = DynamicImage::ImageRgb8(make_test_rgb(48, 64)).to_rgba8();
        let img = DynamicImage::ImageRgba8(rgba);
        encode_image(&img, &path, 90).unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data[0], 0xFF);
        assert_eq!(data[1], 0xD8);
    }

    #[test]
    fn encode_png_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let img = DynamicImage::ImageRgb8(make_test_rgb(32, 16));
        encode_image(&img, &path, 95).unwrap();
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(&back, img.as_rgb8().unwrap());
    }

    #[test]
    fn encode_unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.notanimage");
        let img = DynamicImage::ImageRgb8(make_test_rgb(4, 4));
        assert!(matches!(
            encode_image(&img, &path, 95),
            Err(FaceBlurError::Encode { .. })
        ));
    }

    #[test]
    fn decode_garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(
            decode_image(&path),
            Err(FaceBlurError::Decode { .. })
        ));
    }

    #[test]
    fn decode_sniffs_format_from_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mislabeled = dir.path().join("really_png.jpg");
        let bare = dir.path().join("no_extension");
        let img = DynamicImage::ImageRgb8(make_test_rgb(12, 9));
        img.save_with_format(&mislabeled, ImageFormat::Png).unwrap();
        img.save_with_format(&bare, ImageFormat::Jpeg).unwrap();

        assert_eq!(decode_image(&mislabeled).unwrap().dimensions(), (12, 9));
        assert_eq!(decode_image(&bare).unwrap().dimensions(), (12, 9));
    }

    #[test]
    fn decode_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            decode_image(&dir.path().join("gone.jpg")),
            Err(FaceBlurError::Io { .. })
        ));
    }

    #[test]
    fn copy_onto_itself_keeps_the_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"photo bytes").unwrap();
        let aliased = dir.path().join(".").join("a.jpg");

        copy_original(&path, &aliased).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"photo bytes");
    }

    #[test]
    fn same_file_needs_both_paths_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        assert!(same_file(&path, &path));
        assert!(!same_file(&path, &dir.path().join("b.jpg")));
    }

    #[test]
    fn blur_regions_converts_gray_to_rgb() {
        let mut canvas = DynamicImage::new_luma8(8, 8);
        let region = Region {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        blur_regions(&mut canvas, &[region], &BlurKernel::new(3).unwrap());
        assert!(matches!(canvas, DynamicImage::ImageRgb8(_)));
    }
}
