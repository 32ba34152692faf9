//! The interactive control loop.
//!
//! One task owns catalog, cache, slideshow and file ops. Commands arrive on
//! an mpsc channel, decode completions come back through a `JoinSet`, and
//! directory changes flow in from a `notify` watcher, all multiplexed in a
//! single `select!` loop. Decoded pictures are installed here and nowhere
//! else, so a result that no longer matches the requested path is simply
//! discarded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{RecursiveMode, Watcher, recommended_watcher};
use tokio::select;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::PictureCache;
use crate::catalog::FileCatalog;
use crate::config::{Configuration, DeleteMode};
use crate::decode::{DecodedImage, ImageDecoder};
use crate::error::Error;
use crate::events::{Command, Event};
use crate::fileops::{DeleteBackend, FileOps, PermanentDelete, TrashDelete};
use crate::format;
use crate::orientation::Orientation;
use crate::props::FileProperties;
use crate::slideshow::{Slideshow, SlideshowState};

type Outcome = Result<Arc<DecodedImage>, Error>;

/// Runs the picture manager until cancellation or until the command channel
/// closes.
#[instrument(skip_all)]
pub async fn run(
    cfg: Configuration,
    mut commands: Receiver<Command>,
    events: Sender<Event>,
    cancel: CancellationToken,
) -> Result<()> {
    let decoder = ImageDecoder::new(cfg.extensions.clone());
    let cache = PictureCache::new(decoder, cfg.cache_capacity);
    let slideshow = Slideshow::new(cfg.slideshow_interval);
    let backend: Box<dyn DeleteBackend> = match &cfg.delete {
        DeleteMode::Permanent => Box::new(PermanentDelete),
        DeleteMode::Trash { directory } => Box::new(TrashDelete::new(directory.clone())),
    };

    let mut st = ManagerState {
        cfg,
        catalog: None,
        cache,
        slideshow,
        advance_pending: false,
        fileops: FileOps::new(backend),
        current: None,
        position: None,
        requested: None,
        events,
    };
    let mut decodes: JoinSet<(PathBuf, Outcome)> = JoinSet::new();
    let mut watch: Option<DirWatch> = None;

    loop {
        // Ticks stay disarmed while an automatic advance is still loading;
        // the interval is measured from completion, not dispatch.
        let tick_deadline = if st.advance_pending {
            None
        } else {
            st.slideshow.deadline()
        };

        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting manager task");
                break;
            }

            maybe_cmd = commands.recv() => match maybe_cmd {
                Some(Command::Open(path)) => {
                    watch = st.open_path(path, &mut decodes).await;
                }
                Some(cmd) => st.handle_command(cmd, &mut decodes).await,
                None => {
                    info!("command channel closed; exiting manager task");
                    break;
                }
            },

            Some(joined) = decodes.join_next() => match joined {
                Ok((path, result)) => st.on_decode_done(path, result).await,
                Err(err) => warn!(%err, "decode task aborted"),
            },

            maybe_fs = async {
                match watch.as_mut() {
                    Some(w) => w.rx.recv().await,
                    None => std::future::pending().await,
                }
            } => match maybe_fs {
                Some(Ok(event)) => st.on_fs_event(event, &mut decodes).await,
                Some(Err(err)) => error!(%err, "watch error"),
                None => watch = None,
            },

            _ = async {
                match tick_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => st.tick(&mut decodes).await,
        }
    }

    Ok(())
}

struct Current {
    path: PathBuf,
    image: Arc<DecodedImage>,
    orientation: Orientation,
}

struct ManagerState {
    cfg: Configuration,
    catalog: Option<FileCatalog>,
    cache: PictureCache<ImageDecoder>,
    slideshow: Slideshow,
    /// A slideshow tick's load is still in flight; no new tick until it
    /// settles.
    advance_pending: bool,
    fileops: FileOps<Box<dyn DeleteBackend>>,
    current: Option<Current>,
    /// The catalog position, tracked independently of `current` so a decode
    /// failure still advances navigation.
    position: Option<PathBuf>,
    /// Most recently requested load; completions for anything else are
    /// stale and dropped.
    requested: Option<PathBuf>,
    events: Sender<Event>,
}

impl ManagerState {
    async fn emit(&self, event: Event) {
        let _ = self.events.send(event).await;
    }

    async fn handle_command(&mut self, cmd: Command, decodes: &mut JoinSet<(PathBuf, Outcome)>) {
        match cmd {
            // Re-wires the directory watcher, so the run loop handles it.
            Command::Open(_) => {}
            Command::Next => {
                self.advance(true, decodes).await;
            }
            Command::Previous => {
                self.advance(false, decodes).await;
            }
            Command::StartSlideshow => {
                let now = Instant::now();
                self.apply_slideshow(|s| s.start(now)).await;
            }
            Command::StopSlideshow => {
                self.advance_pending = false;
                self.apply_slideshow(Slideshow::stop).await;
            }
            Command::PauseSlideshow => {
                let now = Instant::now();
                self.apply_slideshow(|s| s.pause(now)).await;
            }
            Command::ResumeSlideshow => {
                let now = Instant::now();
                self.apply_slideshow(|s| s.resume(now)).await;
            }
            Command::RotateLeft => self.reorient(Orientation::rotated_ccw).await,
            Command::RotateRight => self.reorient(Orientation::rotated_cw).await,
            Command::MirrorHorizontal => self.reorient(Orientation::flipped_horizontal).await,
            Command::MirrorVertical => self.reorient(Orientation::flipped_vertical).await,
            Command::Properties => self.send_properties().await,
            Command::Delete { confirmed } => self.delete_current(confirmed, decodes).await,
        }
    }

    async fn open_path(
        &mut self,
        path: PathBuf,
        decodes: &mut JoinSet<(PathBuf, Outcome)>,
    ) -> Option<DirWatch> {
        let (directory, target) = if path.is_dir() {
            (path.clone(), None)
        } else {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (dir, Some(path))
        };

        match FileCatalog::load(&directory, self.cfg.catalog_options()) {
            Ok(catalog) => {
                info!(directory = %directory.display(), count = catalog.len(), "catalog loaded");
                self.emit(Event::CatalogLoaded {
                    directory: directory.clone(),
                    count: catalog.len(),
                })
                .await;

                // Opening a file that isn't listed (wrong extension, not a
                // picture) still attempts the load so the failure reaches
                // the user.
                let first = target.or_else(|| catalog.first().map(Path::to_path_buf));
                self.catalog = Some(catalog);
                self.current = None;
                match first {
                    Some(p) => {
                        self.position = Some(p.clone());
                        self.request_load(p, decodes);
                    }
                    None => {
                        self.position = None;
                        self.emit(Event::FileNameChanged(None)).await;
                        self.emit(Event::NoFileToShow).await;
                    }
                }

                if self.cfg.watch_directory {
                    match watch_directory(&directory) {
                        Ok(watch) => return Some(watch),
                        Err(err) => {
                            warn!(directory = %directory.display(), %err, "cannot watch directory");
                        }
                    }
                }
                None
            }
            Err(error) => {
                warn!(directory = %directory.display(), %error, "cannot enumerate directory");
                self.emit(Event::CatalogError {
                    directory: directory.clone(),
                    error,
                })
                .await;
                // Fall back to an empty catalog.
                self.catalog = Some(FileCatalog::empty(&directory, self.cfg.catalog_options()));
                self.position = None;
                self.current = None;
                self.emit(Event::FileNameChanged(None)).await;
                self.emit(Event::NoFileToShow).await;
                None
            }
        }
    }

    fn request_load(&mut self, path: PathBuf, decodes: &mut JoinSet<(PathBuf, Outcome)>) {
        debug!(path = %path.display(), "requesting decode");
        self.requested = Some(path.clone());
        let cache = self.cache.clone();
        decodes.spawn(async move {
            let result = cache.get(&path).await;
            (path, result)
        });
    }

    /// Moves the catalog position one entry and requests its load. Returns
    /// whether navigation succeeded.
    async fn advance(&mut self, forward: bool, decodes: &mut JoinSet<(PathBuf, Outcome)>) -> bool {
        let target = {
            let Some(catalog) = &self.catalog else {
                self.emit(Event::NoFileToShow).await;
                return false;
            };
            if catalog.is_empty() {
                self.emit(Event::NoFileToShow).await;
                return false;
            }
            match &self.position {
                Some(anchor) if forward => catalog.next(anchor).map(Path::to_path_buf),
                Some(anchor) => catalog.previous(anchor).map(Path::to_path_buf),
                None => catalog
                    .first()
                    .map(Path::to_path_buf)
                    .ok_or(Error::NavigationExhausted),
            }
        };

        match target {
            Ok(path) => {
                self.position = Some(path.clone());
                self.request_load(path, decodes);
                true
            }
            Err(_) => {
                debug!("navigation exhausted");
                self.emit(Event::NavigationExhausted).await;
                false
            }
        }
    }

    async fn on_decode_done(&mut self, path: PathBuf, result: Outcome) {
        if self.requested.as_ref() != Some(&path) {
            debug!(path = %path.display(), "discarding superseded decode result");
            return;
        }
        self.requested = None;
        let was_advance = std::mem::take(&mut self.advance_pending);

        match result {
            Ok(image) => {
                let orientation = image.exif_orientation();
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                self.current = Some(Current {
                    path: path.clone(),
                    image: Arc::clone(&image),
                    orientation,
                });
                self.emit(Event::FileNameChanged(name)).await;
                self.emit(Event::PictureLoaded {
                    path,
                    image,
                    orientation,
                })
                .await;
                if was_advance {
                    self.slideshow.rearm(Instant::now());
                }
            }
            Err(error) => {
                // The previous picture, if any, stays current; only the
                // failure is surfaced.
                warn!(path = %path.display(), %error, "cannot load picture");
                self.emit(Event::LoadFailed { path, error }).await;
                if was_advance {
                    self.slideshow.stop();
                    self.emit(Event::SlideshowChanged(SlideshowState::Stopped))
                        .await;
                }
            }
        }
    }

    async fn tick(&mut self, decodes: &mut JoinSet<(PathBuf, Outcome)>) {
        debug!("slideshow tick");
        if self.advance(true, decodes).await {
            self.advance_pending = true;
        } else {
            // A broken end of the catalog would otherwise spin the timer.
            self.slideshow.stop();
            self.emit(Event::SlideshowChanged(SlideshowState::Stopped))
                .await;
        }
    }

    async fn apply_slideshow<F: FnOnce(&mut Slideshow)>(&mut self, f: F) {
        let before = self.slideshow.state();
        f(&mut self.slideshow);
        let after = self.slideshow.state();
        if before != after {
            info!(?after, "slideshow state");
            self.emit(Event::SlideshowChanged(after)).await;
        }
    }

    async fn reorient(&mut self, f: fn(Orientation) -> Orientation) {
        let Some(current) = &mut self.current else {
            return;
        };
        current.orientation = f(current.orientation);
        let orientation = current.orientation;
        self.emit(Event::OrientationChanged(orientation)).await;
    }

    async fn send_properties(&mut self) {
        let (path, image) = match &self.current {
            Some(cur) => (cur.path.clone(), Some(Arc::clone(&cur.image))),
            // A file that exists but would not decode still has file
            // properties worth showing.
            None => match &self.position {
                Some(p) => (p.clone(), None),
                None => return,
            },
        };
        match FileProperties::capture(&path, image.as_deref(), None) {
            Ok(props) => self.emit(Event::Properties(format::format(&props))).await,
            Err(error) => self.emit(Event::LoadFailed { path, error }).await,
        }
    }

    async fn delete_current(&mut self, confirmed: bool, decodes: &mut JoinSet<(PathBuf, Outcome)>) {
        let Some(path) = self
            .position
            .clone()
            .or_else(|| self.current.as_ref().map(|c| c.path.clone()))
        else {
            return;
        };

        if !confirmed {
            self.emit(Event::ConfirmDelete { path }).await;
            return;
        }

        match self.fileops.delete_file(&path) {
            Ok(()) => {
                self.cache.invalidate(&path);
                let replacement = self.catalog.as_mut().and_then(|c| c.remove(&path));
                if self.current.as_ref().is_some_and(|c| c.path == path) {
                    self.current = None;
                }
                self.emit(Event::Deleted {
                    path,
                    current: replacement.clone(),
                })
                .await;
                match replacement {
                    Some(next) => {
                        self.position = Some(next.clone());
                        self.request_load(next, decodes);
                    }
                    None => {
                        self.position = None;
                        self.emit(Event::FileNameChanged(None)).await;
                        self.emit(Event::NoFileToShow).await;
                    }
                }
            }
            // Catalog and cache stay untouched; the failure is recoverable.
            Err(error) => self.emit(Event::DeleteFailed { path, error }).await,
        }
    }

    async fn on_fs_event(&mut self, event: notify::Event, decodes: &mut JoinSet<(PathBuf, Outcome)>) {
        use notify::EventKind;
        use notify::event::{CreateKind, ModifyKind, RemoveKind};

        match &event.kind {
            EventKind::Create(CreateKind::File) => {
                for p in event.paths {
                    self.note_added(p, decodes).await;
                }
            }
            EventKind::Remove(RemoveKind::File) => {
                for p in event.paths {
                    self.note_removed(p, decodes).await;
                }
            }
            // Renames surface as Name(Any) on some platforms; decide
            // per-path by existence.
            EventKind::Modify(ModifyKind::Name(_)) => {
                for p in event.paths {
                    if p.exists() {
                        self.note_added(p, decodes).await;
                    } else {
                        self.note_removed(p, decodes).await;
                    }
                }
            }
            _ => debug!(kind = ?event.kind, "fs: ignored"),
        }
    }

    async fn note_added(&mut self, path: PathBuf, decodes: &mut JoinSet<(PathBuf, Outcome)>) {
        let Some(catalog) = &mut self.catalog else {
            return;
        };
        if catalog.insert(path.clone()) {
            debug!(path = %path.display(), "fs: added to catalog");
            if self.position.is_none() {
                self.position = Some(path.clone());
                self.request_load(path, decodes);
            }
        }
    }

    async fn note_removed(&mut self, path: PathBuf, decodes: &mut JoinSet<(PathBuf, Outcome)>) {
        let Some(catalog) = &mut self.catalog else {
            return;
        };
        if catalog.position_of(&path).is_none() {
            return;
        }
        let replacement = catalog.remove(&path);
        self.cache.invalidate(&path);
        debug!(path = %path.display(), "fs: removed from catalog");

        let affects_display = self.position.as_ref() == Some(&path)
            || self.current.as_ref().is_some_and(|c| c.path == path);
        if !affects_display {
            return;
        }
        if self.current.as_ref().is_some_and(|c| c.path == path) {
            self.current = None;
        }
        match replacement {
            Some(next) => {
                self.position = Some(next.clone());
                self.request_load(next, decodes);
            }
            None => {
                self.position = None;
                self.emit(Event::FileNameChanged(None)).await;
                self.emit(Event::NoFileToShow).await;
            }
        }
    }
}

struct DirWatch {
    _watcher: notify::RecommendedWatcher,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
}

/// Bridges the notify callback into an async channel watching one directory.
fn watch_directory(dir: &Path) -> Result<DirWatch> {
    let (tx, rx) = mpsc::channel(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = tx.blocking_send(res);
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!(watching = %dir.display(), "notify watcher initialized");
    Ok(DirWatch {
        _watcher: watcher,
        rx,
    })
}
