//! Deletion of catalog files.
//!
//! The manager calls in here only after the collaborator GUI reports user
//! confirmation. Whether removal is permanent or routed to a recoverable
//! trash directory is a platform policy, pluggable behind [`DeleteBackend`].

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Error;

pub trait DeleteBackend: Send + Sync {
    fn delete(&self, path: &Path) -> Result<(), Error>;
}

impl<T: DeleteBackend + ?Sized> DeleteBackend for Box<T> {
    fn delete(&self, path: &Path) -> Result<(), Error> {
        (**self).delete(path)
    }
}

/// Removes the file from the filesystem outright.
#[derive(Debug, Clone, Copy)]
pub struct PermanentDelete;

impl DeleteBackend for PermanentDelete {
    fn delete(&self, path: &Path) -> Result<(), Error> {
        fs::remove_file(path).map_err(|e| delete_failed(path, &e))?;
        info!(path = %path.display(), "deleted");
        Ok(())
    }
}

/// Moves the file into a trash directory, renaming on collision so nothing
/// already trashed is overwritten.
#[derive(Debug, Clone)]
pub struct TrashDelete {
    trash_dir: PathBuf,
}

impl TrashDelete {
    pub fn new(trash_dir: PathBuf) -> Self {
        Self { trash_dir }
    }
}

impl DeleteBackend for TrashDelete {
    fn delete(&self, path: &Path) -> Result<(), Error> {
        fs::create_dir_all(&self.trash_dir).map_err(|e| delete_failed(path, &e))?;
        let name = path.file_name().unwrap_or_else(|| OsStr::new("unnamed"));
        let target = free_target(&self.trash_dir, name);

        match fs::rename(path, &target) {
            Ok(()) => {}
            Err(_) => {
                // Rename fails across filesystems; fall back to copy+remove.
                debug!(path = %path.display(), "rename to trash failed, copying");
                fs::copy(path, &target).map_err(|e| delete_failed(path, &e))?;
                fs::remove_file(path).map_err(|e| delete_failed(path, &e))?;
            }
        }
        info!(path = %path.display(), trash = %target.display(), "moved to trash");
        Ok(())
    }
}

fn free_target(dir: &Path, name: &OsStr) -> PathBuf {
    let mut candidate = dir.join(name);
    let mut counter = 1u32;
    while candidate.exists() {
        let name = Path::new(name);
        let mut renamed = name
            .file_stem()
            .unwrap_or_else(|| OsStr::new("unnamed"))
            .to_os_string();
        renamed.push(format!(".{counter}"));
        if let Some(ext) = name.extension() {
            renamed.push(".");
            renamed.push(ext);
        }
        candidate = dir.join(renamed);
        counter += 1;
    }
    candidate
}

fn delete_failed(path: &Path, err: &std::io::Error) -> Error {
    Error::DeleteFailed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Deletion entry point used by the manager.
pub struct FileOps<B> {
    backend: B,
}

impl<B: DeleteBackend> FileOps<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Deletes `path` through the configured backend.
    ///
    /// # Errors
    /// [`Error::DeleteFailed`] when the file is already gone, locked, or the
    /// backend cannot complete; the caller leaves catalog and cache
    /// untouched in that case.
    pub fn delete_file(&self, path: &Path) -> Result<(), Error> {
        if !path.is_file() {
            return Err(Error::DeleteFailed {
                path: path.to_path_buf(),
                reason: "file does not exist".into(),
            });
        }
        self.backend.delete(path)
    }
}
