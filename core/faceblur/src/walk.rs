use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{FaceBlurError, Result};
use crate::{BlurOutcome, FaceBlurrer};

/// What to do when one file in a tree fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log the failure, record it in the summary and keep going.
    #[default]
    Continue,

    /// Stop the walk and return the error.
    Abort,
}

/// Options for [`blur_all_photos`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// File extensions to process, without the dot. Matching is exact and
    /// case-sensitive.
    pub extensions: Vec<String>,

    /// Failure handling for individual files.
    pub on_error: ErrorPolicy,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string()],
            on_error: ErrorPolicy::Continue,
        }
    }
}

impl WalkOptions {
    /// Whether `path` carries one of the recognized extensions.
    pub fn recognizes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Tally of a directory walk.
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Photos with at least one face, written blurred.
    pub blurred: usize,
    /// Photos without faces, copied unchanged.
    pub copied: usize,
    /// Photos without faces, not written.
    pub no_face: usize,
    /// Files ignored because of their extension.
    pub skipped: usize,
    /// Files (or directories) that could not be processed.
    pub failed: Vec<(PathBuf, FaceBlurError)>,
}

impl WalkSummary {
    /// Number of recognized photos handled, plus every entry in `failed`.
    ///
    /// `failed` also holds directories that could not be mirrored or read,
    /// so this can exceed the number of photos in the tree.
    pub fn processed(&self) -> usize {
        self.blurred + self.copied + self.no_face + self.failed.len()
    }

    fn record(&mut self, outcome: BlurOutcome) {
        match outcome {
            BlurOutcome::Blurred { .. } => self.blurred += 1,
            BlurOutcome::Copied => self.copied += 1,
            BlurOutcome::NoFace => self.no_face += 1,
        }
    }
}

/// Mirror `src_dir` into `dest_dir`, blurring faces in every recognized photo.
///
/// Directories are recreated under `dest_dir` at the same relative path. In
/// each directory, files are handled before subdirectories, both in name
/// order. If `dest_dir` sits inside `src_dir`, it is not walked.
pub fn blur_all_photos(
    src_dir: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
    blurrer: &mut FaceBlurrer,
    options: &WalkOptions,
) -> Result<WalkSummary> {
    let src_dir = src_dir.as_ref();
    let src_root = src_dir.canonicalize().map_err(|source| FaceBlurError::Io {
        path: src_dir.to_path_buf(),
        source,
    })?;
    let dest_root = prepare_dest(dest_dir.as_ref())?;

    tracing::info!("search and blur human faces in {}'s photos", src_root.display());

    let dest_nested = dest_root != src_root && dest_root.starts_with(&src_root);

    let mut summary = WalkSummary::default();
    let walker = WalkDir::new(&src_root)
        .sort_by(files_first)
        .into_iter()
        .filter_entry(|entry| !(dest_nested && entry.path().starts_with(&dest_root)));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                fail(&mut summary, options, path, FaceBlurError::Walk(err))?;
                continue;
            }
        };

        let Some(dest_path) = mirrored_path(&src_root, &dest_root, entry.path()) else {
            continue;
        };

        if entry.file_type().is_dir() {
            if let Err(source) = std::fs::create_dir_all(&dest_path) {
                let err = FaceBlurError::Io {
                    path: dest_path.clone(),
                    source,
                };
                fail(&mut summary, options, dest_path, err)?;
            }
            continue;
        }

        if !entry.path().is_file() {
            continue;
        }

        if !options.recognizes(entry.path()) {
            tracing::debug!("skipping {}", entry.path().display());
            summary.skipped += 1;
            continue;
        }

        match blurrer.blur_file(entry.path(), &dest_path) {
            Ok(outcome) => summary.record(outcome),
            Err(err) => fail(&mut summary, options, entry.into_path(), err)?,
        }
    }

    tracing::info!(
        "done: {} blurred, {} copied, {} without faces, {} skipped, {} failed",
        summary.blurred,
        summary.copied,
        summary.no_face,
        summary.skipped,
        summary.failed.len()
    );

    Ok(summary)
}

fn fail(
    summary: &mut WalkSummary,
    options: &WalkOptions,
    path: PathBuf,
    err: FaceBlurError,
) -> Result<()> {
    match options.on_error {
        ErrorPolicy::Abort => Err(err),
        ErrorPolicy::Continue => {
            tracing::warn!("{}: {err}", path.display());
            summary.failed.push((path, err));
            Ok(())
        }
    }
}

/// Files sort before directories; ties break on name.
fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Path of `entry` re-rooted from `src_root` to `dest_root`.
fn mirrored_path(src_root: &Path, dest_root: &Path, entry: &Path) -> Option<PathBuf> {
    let relative = entry.strip_prefix(src_root).ok()?;
    Some(dest_root.join(relative))
}

/// Create the destination root and resolve it the same way as the source
/// root, so the two can be compared.
fn prepare_dest(dest: &Path) -> Result<PathBuf> {
    let io_err = |source| FaceBlurError::Io {
        path: dest.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dest).map_err(io_err)?;
    dest.canonicalize().map_err(io_err)
}
