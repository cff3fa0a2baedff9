//! Collaborator interfaces for media tooling and analysis.
//!
//! The pipeline never shells out or decodes anything itself. It talks to:
//! - [`MediaToolkit`] for probing, frame extraction, merging and audio
//! - [`ContentAnalyser`] for content-safety checks
//! - [`FaceAnalyser`] for face discovery used when priming references
//!
//! [`FfmpegToolkit`] is the subprocess-backed toolkit.

mod errors;
mod ffmpeg;
mod probe;

use std::path::{Path, PathBuf};

pub use errors::{MediaError, MediaResult};
pub use ffmpeg::FfmpegToolkit;
pub use probe::{
    detect_media_kind, media_kind_from_extension, parse_fps_fraction,
    parse_video_probe,
};

use crate::models::{
    average_faces, select_face, sort_faces, Face, FaceSelectorOrder, MediaKind, Resolution,
    TrimRange, VideoInfo, VisionFrame,
};

/// Frame extraction from a target video into the workspace.
#[derive(Debug, Clone, Copy)]
pub struct ExtractFrames<'a> {
    pub target: &'a Path,
    /// Printf-style pattern, e.g. `<workspace>/%08d.png`.
    pub frame_pattern: &'a Path,
    pub resolution: Resolution,
    pub fps: f64,
    pub trim: TrimRange,
}

/// Encode workspace frames into an intermediate video.
#[derive(Debug, Clone, Copy)]
pub struct MergeVideo<'a> {
    pub frame_pattern: &'a Path,
    pub output: &'a Path,
    pub resolution: Resolution,
    pub fps: f64,
}

/// Mux an external audio track onto the intermediate video.
#[derive(Debug, Clone, Copy)]
pub struct ReplaceAudio<'a> {
    pub video: &'a Path,
    pub audio: &'a Path,
    pub output: &'a Path,
    /// Percent; 100 keeps the original level.
    pub volume: u32,
}

/// Mux the target's own audio, cut to the trim window, onto the
/// intermediate video.
#[derive(Debug, Clone, Copy)]
pub struct RestoreAudio<'a> {
    pub target: &'a Path,
    pub video: &'a Path,
    pub output: &'a Path,
    pub trim: TrimRange,
    pub fps: f64,
    pub volume: u32,
}

/// Media operations consumed by the pipeline. Every operation reports
/// success as a boolean or an `Option`.
pub trait MediaToolkit {
    /// Whether the underlying tools are usable.
    fn pre_check(&self) -> bool {
        true
    }

    fn media_kind(&self, path: &Path) -> MediaKind;

    fn probe_image(&self, path: &Path) -> Option<Resolution>;

    fn probe_video(&self, path: &Path) -> Option<VideoInfo>;

    fn read_image(&self, path: &Path) -> Option<VisionFrame>;

    fn read_video_frame(&self, path: &Path, frame_number: u32) -> Option<VisionFrame>;

    /// Decode every readable image among `paths`, skipping the rest.
    fn read_static_images(&self, paths: &[PathBuf]) -> Vec<VisionFrame> {
        paths
            .iter()
            .filter(|p| self.media_kind(p) == MediaKind::Image)
            .filter_map(|p| self.read_image(p))
            .collect()
    }

    /// Copy the target image into the workspace at `resolution`.
    fn copy_image(&self, target: &Path, temp: &Path, resolution: Resolution) -> bool;

    /// Write the processed workspace image to `output` at `resolution`.
    fn finalize_image(&self, temp: &Path, output: &Path, resolution: Resolution) -> bool;

    fn extract_frames(&self, request: &ExtractFrames<'_>) -> bool;

    fn merge_video(&self, request: &MergeVideo<'_>) -> bool;

    fn replace_audio(&self, request: &ReplaceAudio<'_>) -> bool;

    fn restore_audio(&self, request: &RestoreAudio<'_>) -> bool;
}

/// Content-safety analysis. `true` means the content is flagged.
pub trait ContentAnalyser {
    fn analyse_image(&self, path: &Path) -> bool;

    fn analyse_video(&self, path: &Path, trim: TrimRange) -> bool;
}

/// Analyser that never flags anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveAnalyser;

impl ContentAnalyser for PermissiveAnalyser {
    fn analyse_image(&self, _path: &Path) -> bool {
        false
    }

    fn analyse_video(&self, _path: &Path, _trim: TrimRange) -> bool {
        false
    }
}

/// Face discovery used when priming reference faces.
pub trait FaceAnalyser {
    fn detect_faces(&self, frame: &VisionFrame) -> Vec<Face>;

    /// Merge the main face of each source frame into one identity.
    fn average_face(&self, frames: &[VisionFrame]) -> Option<Face> {
        let faces: Vec<Face> = frames
            .iter()
            .filter_map(|frame| select_face(&self.detect_faces(frame), 0))
            .collect();
        average_faces(&faces)
    }

    fn sort_and_filter(&self, faces: Vec<Face>, order: FaceSelectorOrder) -> Vec<Face> {
        sort_faces(faces, order)
    }
}

/// Face analyser that finds no faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceAnalyser;

impl FaceAnalyser for NoFaceAnalyser {
    fn detect_faces(&self, _frame: &VisionFrame) -> Vec<Face> {
        Vec::new()
    }
}
