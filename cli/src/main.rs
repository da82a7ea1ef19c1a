//! `faceblur` CLI - recognize and blur all faces in photos.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceblur_core::{
    blur_all_photos, BlurParams, DetectionModel, ErrorPolicy, FaceBlurrer, WalkOptions,
    MAX_UPSAMPLING,
};

/// Recognize and blur all faces in a photo, or in every photo of a directory tree.
#[derive(Parser, Debug)]
#[command(name = "faceblur")]
#[command(version, about, long_about = None)]
struct Args {
    /// Source image or directory.
    #[arg(value_name = "SRC")]
    src: PathBuf,

    /// Destination image or directory.
    #[arg(value_name = "DEST")]
    dest: PathBuf,

    /// Copy the source image to the destination even if no face was detected.
    #[arg(short, long)]
    copy: bool,

    /// Face detection model.
    #[arg(short, long, value_enum, default_value_t = ModelArg::from(DetectionModel::default()))]
    model: ModelArg,

    /// Gaussian blur kernel size (the neighbors to be considered); must be odd.
    #[arg(short, long = "blurr", default_value_t = 21, value_name = "ODD_INT", value_parser = parse_odd)]
    blurr: u32,

    /// Upsampling passes; higher values find smaller faces but run slower.
    #[arg(short, long, default_value_t = 1, value_name = "INT",
          value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_UPSAMPLING)))]
    upsampling: u32,

    /// Zoom-in factor; the image is shrunk by this much before detection,
    /// higher values run faster.
    #[arg(short, long = "zoom_in", default_value_t = 1, value_name = "INT",
          value_parser = clap::value_parser!(u32).range(1..))]
    zoom_in: u32,

    /// JPEG output quality (1-100).
    #[arg(short, long, default_value_t = 95, value_name = "INT",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// File extension processed in directory mode (repeatable, case-sensitive).
    #[arg(long = "ext", value_name = "EXT", default_values_t = [String::from("jpg")])]
    extensions: Vec<String>,

    /// Stop a directory run at the first file that fails.
    #[arg(long)]
    fail_fast: bool,

    /// Directory holding the detector model files.
    #[arg(long, env = "FACEBLUR_MODEL_DIR", default_value = "model", value_name = "DIR")]
    model_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelArg {
    /// Histogram-style cascade: faster, less accurate.
    #[value(name = "fast-geometric", alias = "hog")]
    FastGeometric,

    /// Convolutional network: slower, more accurate.
    #[value(name = "neural", alias = "cnn")]
    Neural,
}

impl From<DetectionModel> for ModelArg {
    fn from(model: DetectionModel) -> Self {
        match model {
            DetectionModel::FastGeometric => ModelArg::FastGeometric,
            DetectionModel::Neural => ModelArg::Neural,
        }
    }
}

impl From<ModelArg> for DetectionModel {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::FastGeometric => DetectionModel::FastGeometric,
            ModelArg::Neural => DetectionModel::Neural,
        }
    }
}

fn parse_odd(value: &str) -> Result<u32, String> {
    let size: u32 = value
        .parse()
        .map_err(|_| format!("{value} is not an int value"))?;
    if size % 2 == 0 {
        return Err(format!("{size} is not an odd int value"));
    }
    Ok(size)
}

impl Args {
    fn params(&self) -> BlurParams {
        BlurParams {
            model: self.model.into(),
            upsampling: self.upsampling,
            zoom_factor: self.zoom_in,
            kernel_size: self.blurr,
            copy_when_no_face: self.copy,
            jpeg_quality: self.quality,
        }
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            extensions: self.extensions.clone(),
            on_error: if self.fail_fast {
                ErrorPolicy::Abort
            } else {
                ErrorPolicy::Continue
            },
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("faceblur={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when a directory run finished with failed files.
fn run(args: &Args) -> Result<bool> {
    let params = args.params();
    let mut blurrer = FaceBlurrer::from_model_dir(params, &args.model_dir)
        .with_context(|| format!("Failed to initialize the {} detector", params.model))?;

    if args.src.is_file() {
        blurrer
            .blur_file(&args.src, &args.dest)
            .with_context(|| format!("Failed to process {}", args.src.display()))?;
        return Ok(true);
    }

    let summary = blur_all_photos(&args.src, &args.dest, &mut blurrer, &args.walk_options())
        .with_context(|| format!("Failed to process directory {}", args.src.display()))?;

    for (path, err) in &summary.failed {
        tracing::error!("{}: {err}", path.display());
    }

    Ok(summary.failed.is_empty())
}
