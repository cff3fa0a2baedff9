//! FFmpeg subprocess-backed media toolkit.
//!
//! Every operation runs `ffmpeg`/`ffprobe` synchronously and maps failures
//! to `false`/`None` after logging them.

use std::ffi::OsString;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::errors::{MediaError, MediaResult};
use super::probe::{detect_media_kind, parse_video_probe};
use super::{ExtractFrames, MediaToolkit, MergeVideo, ReplaceAudio, RestoreAudio};
use crate::models::{MediaKind, Resolution, VideoInfo, VisionFrame};

/// Media toolkit running the ffmpeg command line tools.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    video_encoder: String,
    /// Constant rate factor for the video encoder.
    video_quality: u8,
    audio_encoder: String,
}

impl FfmpegToolkit {
    /// Use `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::with_binaries("ffmpeg", "ffprobe")
    }

    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            video_encoder: "libx264".to_string(),
            video_quality: 18,
            audio_encoder: "aac".to_string(),
        }
    }

    pub fn with_video_encoder(mut self, encoder: impl Into<String>, quality: u8) -> Self {
        self.video_encoder = encoder.into();
        self.video_quality = quality;
        self
    }

    pub fn with_audio_encoder(mut self, encoder: impl Into<String>) -> Self {
        self.audio_encoder = encoder.into();
        self
    }

    /// Run ffmpeg with the given arguments, overwriting outputs.
    fn run(&self, args: Vec<OsString>) -> MediaResult<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"])
            .args(args);

        tracing::debug!("Running FFmpeg: {:?}", cmd);

        let output = cmd.output().map_err(|e| MediaError::spawn("ffmpeg", e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::command_failed(
                "ffmpeg",
                output.status.code().unwrap_or(-1),
                stderr.lines().last().unwrap_or("unknown error"),
            ));
        }
        Ok(())
    }

    fn probe_json(&self, path: &Path) -> MediaResult<serde_json::Value> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-show_streams", "-show_format", "-of", "json"])
            .arg(path)
            .output()
            .map_err(|e| MediaError::spawn("ffprobe", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::command_failed(
                "ffprobe",
                output.status.code().unwrap_or(-1),
                stderr.to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::probe(path.display().to_string(), e.to_string()))
    }

    fn decode_video_frame(&self, path: &Path, frame_number: u32) -> MediaResult<VisionFrame> {
        let select = format!("select=eq(n\\,{})", frame_number);
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-i"])
            .arg(path)
            .args([
                "-vf",
                select.as_str(),
                "-vframes",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "-",
            ])
            .output()
            .map_err(|e| MediaError::spawn("ffmpeg", e))?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::command_failed(
                "ffmpeg",
                output.status.code().unwrap_or(-1),
                format!("no frame {} decoded: {}", frame_number, stderr.trim()),
            ));
        }

        let image = image::load(Cursor::new(output.stdout), image::ImageFormat::Png)?;
        Ok(image.to_rgb8())
    }

    fn report(&self, operation: &str, result: MediaResult<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{} failed: {}", operation, e);
                false
            }
        }
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaToolkit for FfmpegToolkit {
    fn pre_check(&self) -> bool {
        let available = |binary: &Path| {
            Command::new(binary)
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        };
        let ok = available(&self.ffmpeg) && available(&self.ffprobe);
        if !ok {
            tracing::error!("ffmpeg/ffprobe not found or not runnable");
        }
        ok
    }

    fn media_kind(&self, path: &Path) -> MediaKind {
        detect_media_kind(path)
    }

    fn probe_image(&self, path: &Path) -> Option<Resolution> {
        match image::image_dimensions(path) {
            Ok((width, height)) => Some(Resolution::new(width, height)),
            Err(e) => {
                tracing::warn!("Failed to probe image {}: {}", path.display(), e);
                None
            }
        }
    }

    fn probe_video(&self, path: &Path) -> Option<VideoInfo> {
        let result = self
            .probe_json(path)
            .and_then(|json| parse_video_probe(&json, path));
        match result {
            Ok(info) => {
                tracing::debug!(
                    "Probed {}: {} @ {:.3} fps, {} frames",
                    path.display(),
                    info.resolution,
                    info.fps,
                    info.frame_total
                );
                Some(info)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    fn read_image(&self, path: &Path) -> Option<VisionFrame> {
        match image::open(path) {
            Ok(image) => Some(image.to_rgb8()),
            Err(e) => {
                tracing::warn!("Failed to read image {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_video_frame(&self, path: &Path, frame_number: u32) -> Option<VisionFrame> {
        match self.decode_video_frame(path, frame_number) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Failed to read frame {} of {}: {}", frame_number, path.display(), e);
                None
            }
        }
    }

    fn copy_image(&self, target: &Path, temp: &Path, resolution: Resolution) -> bool {
        let args: Vec<OsString> = vec![
            "-i".into(),
            target.into(),
            "-vf".into(),
            scale_filter(resolution).into(),
            "-q:v".into(),
            "1".into(),
            temp.into(),
        ];
        self.report("Copying image", self.run(args))
    }

    fn finalize_image(&self, temp: &Path, output: &Path, resolution: Resolution) -> bool {
        let args: Vec<OsString> = vec![
            "-i".into(),
            temp.into(),
            "-vf".into(),
            scale_filter(resolution).into(),
            "-q:v".into(),
            "1".into(),
            output.into(),
        ];
        self.report("Finalizing image", self.run(args))
    }

    fn extract_frames(&self, request: &ExtractFrames<'_>) -> bool {
        let mut filters = Vec::new();
        if request.trim.start > 0 || request.trim.end > 0 {
            filters.push(format!(
                "trim=start_frame={}:end_frame={}",
                request.trim.start, request.trim.end
            ));
        }
        filters.push(scale_filter(request.resolution));
        filters.push(format!("fps={}", request.fps));

        let args: Vec<OsString> = vec![
            "-i".into(),
            request.target.into(),
            "-vf".into(),
            filters.join(",").into(),
            "-vsync".into(),
            "0".into(),
            "-q:v".into(),
            "0".into(),
            request.frame_pattern.into(),
        ];
        self.report("Extracting frames", self.run(args))
    }

    fn merge_video(&self, request: &MergeVideo<'_>) -> bool {
        let args: Vec<OsString> = vec![
            "-r".into(),
            request.fps.to_string().into(),
            "-i".into(),
            request.frame_pattern.into(),
            "-vf".into(),
            scale_filter(request.resolution).into(),
            "-c:v".into(),
            self.video_encoder.as_str().into(),
            "-crf".into(),
            self.video_quality.to_string().into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            request.output.into(),
        ];
        self.report("Merging video", self.run(args))
    }

    fn replace_audio(&self, request: &ReplaceAudio<'_>) -> bool {
        let args: Vec<OsString> = vec![
            "-i".into(),
            request.video.into(),
            "-i".into(),
            request.audio.into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            self.audio_encoder.as_str().into(),
            "-filter:a".into(),
            volume_filter(request.volume).into(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-shortest".into(),
            request.output.into(),
        ];
        self.report("Replacing audio", self.run(args))
    }

    fn restore_audio(&self, request: &RestoreAudio<'_>) -> bool {
        let (start, end) = request.trim.to_secs(request.fps);
        let mut args: Vec<OsString> = vec!["-i".into(), request.video.into()];
        if request.trim.start > 0 {
            args.push("-ss".into());
            args.push(format!("{:.3}", start).into());
        }
        if request.trim.end > 0 {
            args.push("-to".into());
            args.push(format!("{:.3}", end).into());
        }
        let tail: Vec<OsString> = vec![
            "-i".into(),
            request.target.into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            self.audio_encoder.as_str().into(),
            "-filter:a".into(),
            volume_filter(request.volume).into(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-shortest".into(),
            request.output.into(),
        ];
        args.extend(tail);
        self.report("Restoring audio", self.run(args))
    }
}

fn scale_filter(resolution: Resolution) -> String {
    format!("scale={}:{}", resolution.width, resolution.height)
}

fn volume_filter(volume: u32) -> String {
    format!("volume={:.2}", volume as f64 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filters() {
        assert_eq!(scale_filter(Resolution::new(1280, 720)), "scale=1280:720");
        assert_eq!(volume_filter(100), "volume=1.00");
        assert_eq!(volume_filter(50), "volume=0.50");
    }

    #[test]
    fn missing_binaries_fail_pre_check() {
        let toolkit = FfmpegToolkit::with_binaries(
            "/nonexistent/ffmpeg-binary",
            "/nonexistent/ffprobe-binary",
        );
        assert!(!toolkit.pre_check());
        assert!(toolkit.probe_video(Path::new("/nonexistent/clip.mp4")).is_none());
    }

    #[test]
    fn probes_and_reads_images_without_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        VisionFrame::new(6, 4).save(&path).unwrap();

        let toolkit = FfmpegToolkit::new();
        assert_eq!(toolkit.media_kind(&path), MediaKind::Image);
        assert_eq!(toolkit.probe_image(&path), Some(Resolution::new(6, 4)));
        assert_eq!(toolkit.read_image(&path).unwrap().dimensions(), (6, 4));
        assert_eq!(toolkit.read_static_images(&[path.clone(), path]).len(), 2);
    }
}
