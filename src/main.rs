//! Headless driver for the picview picture manager.
//!
//! Opens a file or directory, prints what the manager reports, and can run
//! the slideshow until Ctrl-C. The real GUI collaborator talks to the same
//! command/event channels.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use picview::config::Configuration;
use picview::events::{Command, Event};
use picview::tasks::manager;

#[derive(Debug, Parser)]
#[command(name = "picview", about = "Picture manager for a desktop image viewer")]
struct Cli {
    /// Image file or directory to open
    path: PathBuf,

    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Start the auto-play slideshow immediately
    #[arg(long)]
    slideshow: bool,

    /// Override the slideshow interval (e.g. "4s", "1500ms")
    #[arg(long, value_name = "DURATION")]
    interval: Option<humantime::Duration>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("picview={level}").parse()?)
        .add_directive("notify=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = if cli.config.exists() {
        Configuration::from_yaml_file(&cli.config)
            .with_context(|| format!("loading config from {}", cli.config.display()))?
    } else {
        info!(config = %cli.config.display(), "no config file; using defaults");
        Configuration::default()
    };
    let mut cfg = cfg.validated().context("validating configuration")?;
    if let Some(interval) = cli.interval {
        cfg.slideshow_interval = interval.into();
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(manager::run(cfg, cmd_rx, event_tx, cancel.clone()));

    cmd_tx.send(Command::Open(cli.path.clone())).await?;
    if cli.slideshow {
        cmd_tx.send(Command::StartSlideshow).await?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            maybe_event = event_rx.recv() => match maybe_event {
                Some(event) => report(&cmd_tx, event).await,
                None => break,
            }
        }
    }

    cancel.cancel();
    let _ = task.await;
    Ok(())
}

async fn report(commands: &mpsc::Sender<Command>, event: Event) {
    match event {
        Event::CatalogLoaded { directory, count } => {
            info!(directory = %directory.display(), count, "catalog loaded");
        }
        Event::CatalogError { directory, error } => {
            warn!(directory = %directory.display(), %error, "cannot open directory");
        }
        Event::PictureLoaded { path, image, .. } => {
            info!(
                path = %path.display(),
                width = image.width(),
                height = image.height(),
                frames = image.frame_count(),
                "picture loaded"
            );
            let _ = commands.send(Command::Properties).await;
        }
        Event::LoadFailed { path, error } => {
            warn!(path = %path.display(), %error, "cannot load picture");
        }
        Event::Properties(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Event::SlideshowChanged(state) => info!(?state, "slideshow"),
        Event::NavigationExhausted => info!("no more files"),
        Event::NoFileToShow => info!("no file to show"),
        Event::ConfirmDelete { path } => {
            info!(path = %path.display(), "delete requires confirmation");
        }
        Event::Deleted { path, .. } => info!(path = %path.display(), "deleted"),
        Event::DeleteFailed { path, error } => {
            warn!(path = %path.display(), %error, "delete failed");
        }
        Event::FileNameChanged(_) | Event::OrientationChanged(_) => {}
    }
}
