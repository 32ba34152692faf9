//! Image decoding.
//!
//! Single-frame raster formats go through the `image` crate and come back as
//! one RGBA8 frame. Animated GIF is handled with the `gif` crate directly so
//! the frame count is known from a metadata-only pass while pixel data is
//! decoded lazily, one frame at a time, on first access.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gif::DisposalMethod;
use image::ImageReader;
use tracing::debug;

use crate::catalog::has_supported_extension;
use crate::error::Error;
use crate::orientation::Orientation;

/// Decoding seam: the cache calls through this so tests can count and stub
/// decode work.
pub trait Decode: Send + Sync + 'static {
    fn decode(&self, path: &Path) -> Result<DecodedImage, Error>;
}

/// Container format of a decoded picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl PictureFormat {
    fn from_image(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }
}

impl fmt::Display for PictureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::WebP => "WEBP",
        })
    }
}

/// Color-depth descriptor: palette formats report a discrete color count,
/// direct-color formats report their bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    Indexed(u32),
    TrueColor { bits: u16 },
}

impl ColorDepth {
    pub fn bits(&self) -> u16 {
        match self {
            Self::Indexed(_) => 8,
            Self::TrueColor { bits } => *bits,
        }
    }
}

/// One decoded raster frame, RGBA8. Cloning shares the pixel buffer.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
    /// Display duration for animation frames.
    pub delay: Option<Duration>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .field("delay", &self.delay)
            .finish()
    }
}

/// A decoded picture: format metadata plus an index-addressable frame store.
///
/// The first frame is always decoded; later frames of an animation are
/// decoded on first access and kept. The declared frame count is valid before
/// any of them is touched.
pub struct DecodedImage {
    path: PathBuf,
    format: PictureFormat,
    width: u32,
    height: u32,
    color: ColorDepth,
    frame_count: usize,
    exif_orientation: Orientation,
    frames: Mutex<FrameStore>,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("color", &self.color)
            .field("frame_count", &self.frame_count)
            .field("exif_orientation", &self.exif_orientation)
            .finish_non_exhaustive()
    }
}

impl DecodedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> PictureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_depth(&self) -> ColorDepth {
        self.color
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    /// Orientation recorded in the file's metadata. Starting point for the
    /// display-time orientation flag; pixels are stored unrotated.
    pub fn exif_orientation(&self) -> Orientation {
        self.exif_orientation
    }

    /// The frame at `index`, decoding it (and any earlier ones) on demand.
    ///
    /// # Errors
    /// [`Error::CorruptData`] when the index is outside the declared frame
    /// count or the animation stream ends early.
    pub fn frame(&self, index: usize) -> Result<Frame, Error> {
        if index >= self.frame_count {
            return Err(Error::CorruptData {
                path: self.path.clone(),
                reason: format!(
                    "frame index {index} outside declared count {}",
                    self.frame_count
                ),
            });
        }
        let mut store = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *store {
            FrameStore::Static(frame) => Ok(frame.clone()),
            FrameStore::Animated(anim) => anim.frame(index),
        }
    }
}

enum FrameStore {
    Static(Frame),
    Animated(AnimatedFrames),
}

/// Arena of composited animation frames backed by the open decoder.
struct AnimatedFrames {
    path: PathBuf,
    decoder: gif::Decoder<BufReader<File>>,
    /// Logical-screen canvas the frame rects are composited onto.
    canvas: Vec<u8>,
    width: u32,
    height: u32,
    total: usize,
    frames: Vec<Frame>,
}

impl AnimatedFrames {
    fn frame(&mut self, index: usize) -> Result<Frame, Error> {
        while self.frames.len() <= index {
            self.decode_next()?;
        }
        Ok(self.frames[index].clone())
    }

    fn decode_next(&mut self) -> Result<(), Error> {
        let decoded = self.frames.len();
        let frame = match self.decoder.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Err(Error::CorruptData {
                    path: self.path.clone(),
                    reason: format!(
                        "animation ended after {decoded} of {} declared frames",
                        self.total
                    ),
                });
            }
            Err(err) => return Err(Error::from_gif(&self.path, err)),
        };

        let (cw, ch) = (self.width as usize, self.height as usize);
        let fx = (frame.left as usize).min(cw);
        let fy = (frame.top as usize).min(ch);
        let fw = frame.width as usize;
        let fh = frame.height as usize;
        let vis_w = fw.min(cw - fx);
        let vis_h = fh.min(ch - fy);
        let dispose = frame.dispose;
        let delay = u64::from(frame.delay) * 10;

        // Disposal "previous" restores the canvas as it was before this
        // frame was drawn.
        let restore = matches!(dispose, DisposalMethod::Previous).then(|| self.canvas.clone());

        // Composite the frame rect; fully transparent pixels let the
        // existing canvas show through.
        for row in 0..vis_h {
            for col in 0..vis_w {
                let src = (row * fw + col) * 4;
                if frame.buffer[src + 3] == 0 {
                    continue;
                }
                let dst = ((fy + row) * cw + fx + col) * 4;
                self.canvas[dst..dst + 4].copy_from_slice(&frame.buffer[src..src + 4]);
            }
        }

        self.frames.push(Frame {
            width: self.width,
            height: self.height,
            pixels: Arc::from(self.canvas.as_slice()),
            delay: (delay > 0).then(|| Duration::from_millis(delay)),
        });

        match dispose {
            DisposalMethod::Background => {
                for row in 0..vis_h {
                    let start = ((fy + row) * cw + fx) * 4;
                    self.canvas[start..start + vis_w * 4].fill(0);
                }
            }
            DisposalMethod::Previous => {
                if let Some(prev) = restore {
                    self.canvas = prev;
                }
            }
            DisposalMethod::Any | DisposalMethod::Keep => {}
        }

        Ok(())
    }
}

/// File-backed decoder dispatching on the shared extension allow-list and
/// the sniffed container format.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    extensions: Vec<String>,
}

impl ImageDecoder {
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        }
    }

    fn decode_path(&self, path: &Path) -> Result<DecodedImage, Error> {
        if !has_supported_extension(path, &self.extensions) {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }

        let reader = ImageReader::open(path)
            .map_err(|e| Error::io(path, &e))?
            .with_guessed_format()
            .map_err(|e| Error::io(path, &e))?;
        let Some(format) = reader.format() else {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        };

        if format == image::ImageFormat::Gif {
            drop(reader);
            return decode_gif(path);
        }
        let Some(tag) = PictureFormat::from_image(format) else {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        };
        decode_static(path, tag, reader)
    }
}

impl Decode for ImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, Error> {
        self.decode_path(path)
    }
}

fn decode_static(
    path: &Path,
    format: PictureFormat,
    reader: ImageReader<BufReader<File>>,
) -> Result<DecodedImage, Error> {
    let img = reader.decode().map_err(|e| Error::from_image(path, e))?;
    let color = color_depth_of(img.color());
    let (width, height) = (img.width(), img.height());
    let exif_orientation = read_exif_orientation(path)
        .map(Orientation::from_exif)
        .unwrap_or_default();

    let rgba = img.into_rgba8();
    let frame = Frame {
        width,
        height,
        pixels: Arc::from(rgba.into_raw()),
        delay: None,
    };

    debug!(path = %path.display(), %format, width, height, "decoded");
    Ok(DecodedImage {
        path: path.to_path_buf(),
        format,
        width,
        height,
        color,
        frame_count: 1,
        exif_orientation,
        frames: Mutex::new(FrameStore::Static(frame)),
    })
}

fn decode_gif(path: &Path) -> Result<DecodedImage, Error> {
    // Metadata pass: frame count and palette size, no pixel decode.
    let file = File::open(path).map_err(|e| Error::io(path, &e))?;
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut meta = options
        .read_info(BufReader::new(file))
        .map_err(|e| Error::from_gif(path, e))?;
    let palette_entries = meta.global_palette().map(|p| (p.len() / 3) as u32);
    let mut total = 0usize;
    while meta
        .next_frame_info()
        .map_err(|e| Error::from_gif(path, e))?
        .is_some()
    {
        total += 1;
    }
    drop(meta);
    if total == 0 {
        return Err(Error::CorruptData {
            path: path.to_path_buf(),
            reason: "container holds no frames".into(),
        });
    }

    // Pixel stream for the lazy frame store.
    let file = File::open(path).map_err(|e| Error::io(path, &e))?;
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let decoder = options
        .read_info(BufReader::new(file))
        .map_err(|e| Error::from_gif(path, e))?;
    let width = u32::from(decoder.width());
    let height = u32::from(decoder.height());
    if width == 0 || height == 0 {
        return Err(Error::CorruptData {
            path: path.to_path_buf(),
            reason: "zero logical screen size".into(),
        });
    }

    let color = match palette_entries {
        Some(n) if n > 0 => ColorDepth::Indexed(n),
        _ => ColorDepth::TrueColor { bits: 32 },
    };

    let mut anim = AnimatedFrames {
        path: path.to_path_buf(),
        decoder,
        canvas: vec![0u8; width as usize * height as usize * 4],
        width,
        height,
        total,
        frames: Vec::new(),
    };
    // First frame up front; the rest stay in the container until asked for.
    anim.decode_next()?;

    debug!(path = %path.display(), width, height, frames = total, "decoded gif header");
    Ok(DecodedImage {
        path: path.to_path_buf(),
        format: PictureFormat::Gif,
        width,
        height,
        color,
        frame_count: total,
        exif_orientation: Orientation::default(),
        frames: Mutex::new(FrameStore::Animated(anim)),
    })
}

fn color_depth_of(color: image::ColorType) -> ColorDepth {
    use image::ColorType;
    let bits = match color {
        ColorType::L8 => 8,
        ColorType::La8 | ColorType::L16 => 16,
        ColorType::Rgb8 => 24,
        ColorType::Rgba8 | ColorType::La16 => 32,
        ColorType::Rgb16 => 48,
        ColorType::Rgba16 => 64,
        ColorType::Rgb32F => 96,
        ColorType::Rgba32F => 128,
        _ => 32,
    };
    ColorDepth::TrueColor { bits }
}

fn read_exif_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let reader = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = reader.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Short(arr) if !arr.is_empty() => Some(arr[0]),
        exif::Value::Long(arr) if !arr.is_empty() => Some(arr[0] as u16),
        _ => None,
    }
}
