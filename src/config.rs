use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::catalog::{CatalogOptions, DEFAULT_EXTENSIONS};

/// Viewer configuration, read-only from the picture manager's perspective.
/// Owned by the external settings collaborator; this core only consumes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Delay between automatic slideshow advances.
    #[serde(with = "humantime_serde")]
    pub slideshow_interval: Duration,
    /// Smoothing policy hint for the rendering collaborator.
    pub antialiasing: AntialiasMode,
    /// Background hint for the rendering collaborator.
    pub background: BackgroundConfig,
    /// Extension allow-list shared by catalog filtering and decoder dispatch.
    pub extensions: Vec<String>,
    /// Whether next/previous wrap around at the catalog ends.
    pub wrap_navigation: bool,
    /// Whether catalog enumeration descends into subdirectories.
    pub recursive_scan: bool,
    /// How many decoded pictures to keep in memory.
    pub cache_capacity: usize,
    /// Whether to watch the open directory for external changes.
    pub watch_directory: bool,
    /// What deleting the current file does.
    pub delete: DeleteMode,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            slideshow_interval: Duration::from_secs(5),
            antialiasing: AntialiasMode::default(),
            background: BackgroundConfig::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_owned()).collect(),
            wrap_navigation: false,
            recursive_scan: false,
            cache_capacity: 1,
            watch_directory: true,
            delete: DeleteMode::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde
    /// defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            self.slideshow_interval > Duration::ZERO,
            "slideshow-interval must be positive"
        );
        ensure!(self.cache_capacity >= 1, "cache-capacity must be at least 1");
        ensure!(
            !self.extensions.is_empty(),
            "extensions must list at least one entry"
        );
        for ext in &mut self.extensions {
            ensure!(!ext.is_empty(), "extensions entries must not be empty");
            *ext = ext.to_ascii_lowercase();
        }
        if let DeleteMode::Trash { directory } = &self.delete {
            ensure!(
                !directory.as_os_str().is_empty(),
                "delete.directory must not be empty"
            );
        }
        Ok(self)
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            extensions: self.extensions.clone(),
            wrap: self.wrap_navigation,
            recursive: self.recursive_scan,
        }
    }
}

/// When the renderer should smooth a scaled picture. Consumed downstream;
/// never mutated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AntialiasMode {
    #[default]
    WhenEnlarged,
    Always,
    Never,
}

impl AntialiasMode {
    pub fn should_smooth(self, scale: f64) -> bool {
        match self {
            Self::WhenEnlarged => scale > 1.0,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BackgroundConfig {
    /// Whether the custom color overrides the default chrome background.
    pub custom_color: bool,
    pub color: [u8; 3],
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            custom_color: false,
            color: [0, 0, 0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "mode")]
pub enum DeleteMode {
    #[default]
    Permanent,
    Trash { directory: PathBuf },
}
