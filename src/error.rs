use std::path::{Path, PathBuf};

use thiserror::Error;

/// Library error type for picture-manager operations.
///
/// Variants capture their source as text so outcomes stay cloneable; a decode
/// result shared between several cache waiters hands every waiter the same
/// error.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Directory enumeration could not complete (missing path, permissions).
    #[error("cannot read directory '{dir}': {reason}", dir = .path.display())]
    DirectoryUnreadable { path: PathBuf, reason: String },

    /// The file is not a recognized image format.
    #[error("unsupported image format: '{file}'", file = .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// The container was recognized but its data could not be decoded.
    #[error("corrupt image data in '{file}': {reason}", file = .path.display())]
    CorruptData { path: PathBuf, reason: String },

    /// Underlying read failure.
    #[error("i/o error on '{file}': {reason}", file = .path.display())]
    Io { path: PathBuf, reason: String },

    /// Deletion failed; catalog and cache are left untouched.
    #[error("cannot delete '{file}': {reason}", file = .path.display())]
    DeleteFailed { path: PathBuf, reason: String },

    /// No next/previous entry in the catalog.
    #[error("no more files in the catalog")]
    NavigationExhausted,
}

impl Error {
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn from_image(path: &Path, err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::io(path, &e),
            image::ImageError::Unsupported(_) => Self::UnsupportedFormat {
                path: path.to_path_buf(),
            },
            other => Self::CorruptData {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn from_gif(path: &Path, err: gif::DecodingError) -> Self {
        match err {
            gif::DecodingError::Io(e) => Self::io(path, &e),
            other => Self::CorruptData {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}
