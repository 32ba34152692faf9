use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use picview::config::Configuration;
use picview::events::{Command, Event};
use picview::slideshow::SlideshowState;
use picview::tasks::manager;
use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Harness {
    _tmp: TempDir,
    dir: PathBuf,
    commands: Sender<Command>,
    events: Receiver<Event>,
    cancel: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    async fn shutdown(mut self) {
        self.events.close();
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

fn spawn_manager(cfg: Configuration) -> Harness {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager::run(cfg, cmd_rx, event_tx, cancel.clone()));
    Harness {
        _tmp: tmp,
        dir,
        commands: cmd_tx,
        events: event_rx,
        cancel,
        handle,
    }
}

fn test_config() -> Configuration {
    Configuration {
        // Keep the integration runs deterministic: no notify dependency.
        watch_directory: false,
        ..Configuration::default()
    }
}

fn write_png(path: &Path) {
    image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
        .save(path)
        .unwrap();
}

fn write_jpeg(path: &Path) {
    image::RgbImage::from_pixel(2, 2, image::Rgb([120, 130, 140]))
        .save(path)
        .unwrap();
}

fn write_gif(path: &Path, frames: usize) {
    let mut file = File::create(path).unwrap();
    let palette = [0u8, 0, 0, 255, 255, 255];
    let mut encoder = gif::Encoder::new(&mut file, 2, 1, &palette).unwrap();
    for i in 0..frames {
        let mut frame = gif::Frame::default();
        frame.width = 2;
        frame.height = 1;
        frame.buffer = Cow::Owned(vec![(i % 2) as u8, ((i + 1) % 2) as u8]);
        frame.delay = 10;
        encoder.write_frame(&frame).unwrap();
    }
}

async fn wait_for<F>(events: &mut Receiver<Event>, mut pred: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timeout waiting for event")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

fn loaded_path(event: &Event) -> Option<&Path> {
    match event {
        Event::PictureLoaded { path, .. } => Some(path),
        _ => None,
    }
}

async fn wait_for_loaded(events: &mut Receiver<Event>, path: &Path) -> Event {
    wait_for(events, |e| loaded_path(e) == Some(path)).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn opening_a_directory_loads_the_first_entry() {
    let mut h = spawn_manager(test_config());
    let a = h.dir.join("a.png");
    write_png(&a);
    write_png(&h.dir.join("b.png"));

    h.commands
        .send(Command::Open(h.dir.clone()))
        .await
        .unwrap();

    wait_for(&mut h.events, |e| {
        matches!(e, Event::CatalogLoaded { count: 2, .. })
    })
    .await;
    wait_for_loaded(&mut h.events, &a).await;

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manual_navigation_walks_the_catalog_and_clamps() {
    let mut h = spawn_manager(test_config());
    let a = h.dir.join("a.png");
    let b = h.dir.join("b.png");
    write_png(&a);
    write_png(&b);

    h.commands
        .send(Command::Open(h.dir.clone()))
        .await
        .unwrap();
    wait_for_loaded(&mut h.events, &a).await;

    h.commands.send(Command::Next).await.unwrap();
    wait_for_loaded(&mut h.events, &b).await;

    // Clamped: past the last entry only the exhaustion signal arrives.
    h.commands.send(Command::Next).await.unwrap();
    wait_for(&mut h.events, |e| matches!(e, Event::NavigationExhausted)).await;

    h.commands.send(Command::Previous).await.unwrap();
    wait_for_loaded(&mut h.events, &a).await;

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn decode_failure_surfaces_but_navigation_still_advances() {
    let mut h = spawn_manager(test_config());
    let a = h.dir.join("a.png");
    let b = h.dir.join("b.png");
    let c = h.dir.join("c.png");
    write_png(&a);
    std::fs::write(&b, b"junk").unwrap();
    write_png(&c);

    h.commands
        .send(Command::Open(h.dir.clone()))
        .await
        .unwrap();
    wait_for_loaded(&mut h.events, &a).await;

    h.commands.send(Command::Next).await.unwrap();
    let failed = wait_for(&mut h.events, |e| matches!(e, Event::LoadFailed { .. })).await;
    match failed {
        Event::LoadFailed { path, .. } => assert_eq!(path, b),
        _ => unreachable!(),
    }

    // The position moved past the broken file.
    h.commands.send(Command::Next).await.unwrap();
    wait_for_loaded(&mut h.events, &c).await;

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_needs_confirmation_then_patches_the_catalog() {
    let mut h = spawn_manager(test_config());
    let a = h.dir.join("a.png");
    let b = h.dir.join("b.png");
    write_png(&a);
    write_png(&b);

    h.commands
        .send(Command::Open(h.dir.clone()))
        .await
        .unwrap();
    wait_for_loaded(&mut h.events, &a).await;

    // Unconfirmed requests only echo the confirmation prompt.
    h.commands
        .send(Command::Delete { confirmed: false })
        .await
        .unwrap();
    let prompt = wait_for(&mut h.events, |e| matches!(e, Event::ConfirmDelete { .. })).await;
    match prompt {
        Event::ConfirmDelete { path } => assert_eq!(path, a),
        _ => unreachable!(),
    }
    assert!(a.exists());

    h.commands
        .send(Command::Delete { confirmed: true })
        .await
        .unwrap();
    let deleted = wait_for(&mut h.events, |e| matches!(e, Event::Deleted { .. })).await;
    match deleted {
        Event::Deleted { path, current } => {
            assert_eq!(path, a);
            assert_eq!(current, Some(b.clone()));
        }
        _ => unreachable!(),
    }
    assert!(!a.exists());
    wait_for_loaded(&mut h.events, &b).await;

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slideshow_advances_then_stops_at_the_end() {
    let mut cfg = test_config();
    cfg.slideshow_interval = Duration::from_millis(50);
    let mut h = spawn_manager(cfg);
    let a = h.dir.join("a.png");
    let b = h.dir.join("b.png");
    let c = h.dir.join("c.png");
    write_png(&a);
    write_png(&b);
    write_png(&c);

    h.commands
        .send(Command::Open(h.dir.clone()))
        .await
        .unwrap();
    wait_for_loaded(&mut h.events, &a).await;

    h.commands.send(Command::StartSlideshow).await.unwrap();
    wait_for(&mut h.events, |e| {
        matches!(e, Event::SlideshowChanged(SlideshowState::Running))
    })
    .await;

    wait_for_loaded(&mut h.events, &b).await;
    wait_for_loaded(&mut h.events, &c).await;

    // No wrap configured: the exhausted catalog stops the show.
    wait_for(&mut h.events, |e| matches!(e, Event::NavigationExhausted)).await;
    wait_for(&mut h.events, |e| {
        matches!(e, Event::SlideshowChanged(SlideshowState::Stopped))
    })
    .await;

    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_mixed_directory_with_animated_gif() {
    let mut h = spawn_manager(test_config());
    let a = h.dir.join("a.jpg");
    let b = h.dir.join("b.png");
    let c = h.dir.join("c.gif");
    write_jpeg(&a);
    write_png(&b);
    write_gif(&c, 10);

    h.commands
        .send(Command::Open(h.dir.clone()))
        .await
        .unwrap();
    wait_for(&mut h.events, |e| {
        matches!(e, Event::CatalogLoaded { count: 3, .. })
    })
    .await;
    wait_for_loaded(&mut h.events, &a).await;

    // Catalog order is a.jpg, b.png, c.gif.
    h.commands.send(Command::Next).await.unwrap();
    wait_for_loaded(&mut h.events, &b).await;
    h.commands.send(Command::Next).await.unwrap();
    let loaded = wait_for_loaded(&mut h.events, &c).await;
    match &loaded {
        Event::PictureLoaded { image, .. } => assert_eq!(image.frame_count(), 10),
        _ => unreachable!(),
    }

    // The gif's property lines report its frame count.
    h.commands.send(Command::Properties).await.unwrap();
    let props = wait_for(&mut h.events, |e| matches!(e, Event::Properties(_))).await;
    match props {
        Event::Properties(lines) => {
            let frame_line = lines
                .iter()
                .find(|l| l.label == "Frame Count")
                .expect("gif properties carry a frame count line");
            assert_eq!(frame_line.value, "10");
            assert!(
                lines
                    .iter()
                    .any(|l| l.label == "Image Format" && l.value == "GIF")
            );
        }
        _ => unreachable!(),
    }

    // Deleting b.png leaves [a.jpg, c.gif] and keeps c navigable.
    h.commands.send(Command::Previous).await.unwrap();
    wait_for_loaded(&mut h.events, &b).await;
    h.commands
        .send(Command::Delete { confirmed: true })
        .await
        .unwrap();
    let deleted = wait_for(&mut h.events, |e| matches!(e, Event::Deleted { .. })).await;
    match deleted {
        Event::Deleted { path, current } => {
            assert_eq!(path, b);
            assert_eq!(current, Some(c.clone()));
        }
        _ => unreachable!(),
    }
    wait_for_loaded(&mut h.events, &c).await;

    h.commands.send(Command::Previous).await.unwrap();
    wait_for_loaded(&mut h.events, &a).await;

    h.shutdown().await;
}
