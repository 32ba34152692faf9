//! Pure formatting of [`FileProperties`] into labeled property lines.
//!
//! No I/O happens here; the collaborator GUI renders the lines as-is.

use std::fmt;

use chrono::{DateTime, Local};

use crate::decode::ColorDepth;
use crate::props::FileProperties;

/// Fixed calendar pattern for the timestamp lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d, %H:%M:%S";

/// One labeled line of the property panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLine {
    pub label: String,
    pub value: String,
}

impl PropertyLine {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_owned(),
            value: value.into(),
        }
    }
}

impl fmt::Display for PropertyLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

/// Turns a property snapshot into ordered display lines.
///
/// Lines for absent values are omitted: no Frame Count for single-frame
/// pictures, no Color Count for sub-16-bit direct color, no timestamps the
/// filesystem could not report.
pub fn format(props: &FileProperties) -> Vec<PropertyLine> {
    let mut lines = Vec::new();

    lines.push(PropertyLine::new("File Name", props.file_name.clone()));
    lines.push(PropertyLine::new(
        "File Size",
        format!(
            "{} ({} Bytes)",
            format_file_size(props.byte_size),
            props.byte_size
        ),
    ));
    if let Some(t) = &props.created {
        lines.push(PropertyLine::new("Created Time", format_timestamp(t)));
    }
    if let Some(t) = &props.modified {
        lines.push(PropertyLine::new("Modified Time", format_timestamp(t)));
    }
    if let Some(t) = &props.accessed {
        lines.push(PropertyLine::new("Last Read", format_timestamp(t)));
    }
    if let Some(format) = &props.format {
        lines.push(PropertyLine::new("Image Format", format.to_string()));
    }
    if let Some(color) = &props.color {
        match color {
            ColorDepth::Indexed(count) => {
                lines.push(PropertyLine::new("Color Count", count.to_string()));
            }
            ColorDepth::TrueColor { bits } if *bits >= 16 => {
                lines.push(PropertyLine::new("Color Count", "True color"));
            }
            ColorDepth::TrueColor { .. } => {}
        }
        lines.push(PropertyLine::new("Depth", color.bits().to_string()));
    }
    if let Some((width, height)) = props.dimensions {
        let d = gcd(width, height);
        let ratio = if d == 0 {
            "1:1".to_owned()
        } else {
            format!("{}:{}", width / d, height / d)
        };
        lines.push(PropertyLine::new(
            "Size",
            format!("{width} x {height} ({ratio})"),
        ));
    }
    if let Some(frames) = props.frame_count
        && frames > 1
    {
        lines.push(PropertyLine::new("Frame Count", frames.to_string()));
    }
    if let Some(scale) = props.scale {
        lines.push(PropertyLine::new(
            "Current Scale",
            format!("{}%", format_significant(scale * 100.0)),
        ));
    }

    lines
}

/// Humanized byte size: B/KB/MB/GB at 1024 boundaries, three significant
/// digits.
pub fn format_file_size(size: u64) -> String {
    const ONE_K: u64 = 1024;
    const ONE_M: u64 = 1024 * 1024;
    const ONE_G: u64 = 1024 * 1024 * 1024;

    if size <= ONE_K {
        format!("{size} B")
    } else if size <= ONE_M {
        format!("{} KB", format_significant(size as f64 / ONE_K as f64))
    } else if size <= ONE_G {
        format!("{} MB", format_significant(size as f64 / ONE_M as f64))
    } else {
        format!("{} GB", format_significant(size as f64 / ONE_G as f64))
    }
}

fn format_timestamp(t: &DateTime<Local>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Three significant digits with trailing zeros trimmed, `%g` style.
fn format_significant(v: f64) -> String {
    let s = if v >= 100.0 {
        format!("{v:.0}")
    } else if v >= 10.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.2}")
    };
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s
    }
}

pub(crate) fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
