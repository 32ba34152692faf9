use std::path::PathBuf;
use std::sync::Arc;

use crate::decode::DecodedImage;
use crate::error::Error;
use crate::format::PropertyLine;
use crate::orientation::Orientation;
use crate::slideshow::SlideshowState;

/// Requests from the GUI collaborator into the picture manager.
#[derive(Debug)]
pub enum Command {
    /// Open an image file (its directory becomes the catalog) or a
    /// directory (positions on the first entry).
    Open(PathBuf),
    Next,
    Previous,
    StartSlideshow,
    StopSlideshow,
    PauseSlideshow,
    ResumeSlideshow,
    RotateLeft,
    RotateRight,
    MirrorHorizontal,
    MirrorVertical,
    /// Ask for the property lines of the current picture.
    Properties,
    /// Delete the current file. With `confirmed: false` the manager answers
    /// with [`Event::ConfirmDelete`] and does nothing else.
    Delete { confirmed: bool },
}

/// Notifications from the picture manager to the GUI collaborator.
#[derive(Debug)]
pub enum Event {
    CatalogLoaded {
        directory: PathBuf,
        count: usize,
    },
    CatalogError {
        directory: PathBuf,
        error: Error,
    },
    /// A picture finished decoding and is now current.
    PictureLoaded {
        path: PathBuf,
        image: Arc<DecodedImage>,
        orientation: Orientation,
    },
    /// The navigation target could not be decoded; the previous picture, if
    /// any, stays current.
    LoadFailed {
        path: PathBuf,
        error: Error,
    },
    FileNameChanged(Option<String>),
    OrientationChanged(Orientation),
    Properties(Vec<PropertyLine>),
    SlideshowChanged(SlideshowState),
    /// Deletion was requested without confirmation; the GUI asks the user
    /// and re-sends with `confirmed: true`.
    ConfirmDelete {
        path: PathBuf,
    },
    Deleted {
        path: PathBuf,
        /// The entry that took the deleted file's place, if any.
        current: Option<PathBuf>,
    },
    DeleteFailed {
        path: PathBuf,
        error: Error,
    },
    /// No next/previous entry in the configured direction.
    NavigationExhausted,
    /// The catalog is empty; nothing to display.
    NoFileToShow,
}
