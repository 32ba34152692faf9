//! File property snapshots for the attribute panel.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::decode::{ColorDepth, DecodedImage, PictureFormat};
use crate::error::Error;

/// Read-only snapshot of a file plus the descriptors of its decoded picture.
/// Reflects the file state at capture time; stale after external
/// modification until recaptured.
#[derive(Debug, Clone)]
pub struct FileProperties {
    pub path: PathBuf,
    pub file_name: String,
    pub byte_size: u64,
    pub created: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    pub accessed: Option<DateTime<Local>>,
    pub format: Option<PictureFormat>,
    pub dimensions: Option<(u32, u32)>,
    pub color: Option<ColorDepth>,
    pub frame_count: Option<usize>,
    /// Display scale as a fraction (1.0 = 100%), when the renderer knows it.
    pub scale: Option<f64>,
}

impl FileProperties {
    /// Captures filesystem metadata for `path` and copies the picture
    /// descriptors out of `image` when one is loaded.
    ///
    /// # Errors
    /// [`Error::Io`] when the file metadata cannot be read.
    pub fn capture(
        path: &Path,
        image: Option<&DecodedImage>,
        scale: Option<f64>,
    ) -> Result<Self, Error> {
        let meta = fs::metadata(path).map_err(|e| Error::io(path, &e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            byte_size: meta.len(),
            created: meta.created().ok().map(DateTime::<Local>::from),
            modified: meta.modified().ok().map(DateTime::<Local>::from),
            accessed: meta.accessed().ok().map(DateTime::<Local>::from),
            format: image.map(DecodedImage::format),
            dimensions: image.map(DecodedImage::dimensions),
            color: image.map(DecodedImage::color_depth),
            frame_count: image.map(DecodedImage::frame_count),
            scale,
        })
    }
}
