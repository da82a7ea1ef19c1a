//! Print the boxes a detector finds in one or more photos, without blurring.
//!
//! Usage:
//!   cargo run --example debug_face_detection -- [--neural] [--zoom N] <image>...
//!
//! Models are read from `$FACEBLUR_MODEL_DIR`, or `model/` at the workspace root.

use std::path::PathBuf;

use faceblur::{downscale, load_detector, BlurParams, DetectionModel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut params = BlurParams {
        model: DetectionModel::FastGeometric,
        ..BlurParams::default()
    };
    let mut images = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--neural" => params.model = DetectionModel::Neural,
            "--zoom" => {
                let value = args.next().ok_or("--zoom needs a value")?;
                params.zoom_factor = value.parse()?;
            }
            _ => images.push(PathBuf::from(arg)),
        }
    }
    params.validate()?;

    let model_dir = std::env::var_os("FACEBLUR_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../model")));
    let mut detector = load_detector(&params, &model_dir)?;

    for path in &images {
        let image = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;
        let (width, height) = (image.width(), image.height());
        let small = downscale(&image, params.zoom_factor);

        println!("=== {} ({width}x{height}, {} model) ===", path.display(), params.model);

        let faces = detector.detect(&small)?;
        if faces.is_empty() {
            println!("  NO FACES DETECTED");
            continue;
        }

        println!("  Found {} face(s):", faces.len());
        for (i, face) in faces.iter().enumerate() {
            let scaled = face.scaled(params.zoom_factor);
            match scaled.clamp_to(width, height) {
                Some(region) => println!(
                    "    face {i}: box={scaled:?}, blur region=({}, {}, {}x{})",
                    region.x, region.y, region.width, region.height
                ),
                None => println!("    face {i}: box={scaled:?} lies outside the image"),
            }
        }
    }

    Ok(())
}
