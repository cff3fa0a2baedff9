//! Media geometry: resolutions, frame rates and trim windows.
//!
//! The clamping helpers take probe data rather than paths so the
//! controller can apply them to whatever the toolkit reports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width and height in pixels, written as `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error parsing a `WxH` resolution string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid resolution '{0}', expected WIDTHxHEIGHT")]
pub struct ParseResolutionError(String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| ParseResolutionError(s.to_string()))?;
        let width: u32 = w.parse().map_err(|_| ParseResolutionError(s.to_string()))?;
        let height: u32 = h.parse().map_err(|_| ParseResolutionError(s.to_string()))?;
        if width == 0 || height == 0 {
            return Err(ParseResolutionError(s.to_string()));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = ParseResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// Probe data for a video file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub resolution: Resolution,
    pub fps: f64,
    pub frame_total: u32,
    pub has_audio: bool,
}

/// Half-open frame window `[start, end)` within a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrimRange {
    pub start: u32,
    pub end: u32,
}

impl TrimRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of frames inside the window.
    pub fn frame_count(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the window spans the whole video.
    pub fn is_full(&self, frame_total: u32) -> bool {
        self.start == 0 && self.end >= frame_total
    }

    /// Window boundaries in seconds at the given rate.
    pub fn to_secs(&self, fps: f64) -> (f64, f64) {
        if fps <= 0.0 {
            return (0.0, 0.0);
        }
        (self.start as f64 / fps, self.end as f64 / fps)
    }
}

/// Clamp a requested image resolution to the source's actual size.
///
/// Images are never upscaled: a request larger than the source falls back
/// to the source resolution.
pub fn restrict_image_resolution(actual: Resolution, requested: Option<Resolution>) -> Resolution {
    match requested {
        Some(r) if r.pixels() < actual.pixels() => r,
        _ => actual,
    }
}

/// Clamp a requested video resolution to the source's actual size.
pub fn restrict_video_resolution(actual: Resolution, requested: Option<Resolution>) -> Resolution {
    restrict_image_resolution(actual, requested)
}

/// Clamp a requested frame rate to the source's rate.
pub fn restrict_video_fps(actual: f64, requested: Option<f64>) -> f64 {
    match requested {
        Some(fps) if fps > 0.0 && (actual <= 0.0 || fps < actual) => fps,
        _ => actual,
    }
}

/// Resolve trim boundaries against the video's frame total.
///
/// Each bound is clamped into `[0, frame_total]`; a missing (or zero) bound
/// falls back to the start or end of the video. A start past the end is
/// pulled back to the end, leaving an empty window.
pub fn restrict_trim_frame(frame_total: u32, start: Option<u32>, end: Option<u32>) -> TrimRange {
    let end = end
        .map(|e| e.min(frame_total))
        .filter(|e| *e > 0)
        .unwrap_or(frame_total);
    let start = start.map(|s| s.min(end)).unwrap_or(0);
    TrimRange::new(start, end)
}
