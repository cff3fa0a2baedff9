//! Media kind detection and ffprobe output parsing.

use std::path::Path;

use serde_json::Value;

use super::errors::{MediaError, MediaResult};
use crate::models::{MediaKind, Resolution, VideoInfo};

const IMAGE_EXTENSIONS: &[&str] = &["bmp", "jpeg", "jpg", "png", "tif", "tiff", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["avi", "m4v", "mkv", "mov", "mp4", "mpeg", "webm", "wmv"];
const AUDIO_EXTENSIONS: &[&str] = &["aac", "flac", "m4a", "mp3", "ogg", "opus", "wav"];

/// Classify a file by its extension. Missing files are `Unknown`.
pub fn detect_media_kind(path: &Path) -> MediaKind {
    if !path.is_file() {
        return MediaKind::Unknown;
    }
    media_kind_from_extension(path)
}

/// Classify a path by extension only.
pub fn media_kind_from_extension(path: &Path) -> MediaKind {
    let Some(extension) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    else {
        return MediaKind::Unknown;
    };

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Image
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Video
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Audio
    } else {
        MediaKind::Unknown
    }
}

/// Parse an ffprobe frame rate such as `30000/1001` or `25`.
pub fn parse_fps_fraction(value: &str) -> Option<f64> {
    let fps = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (fps > 0.0).then_some(fps)
}

/// Build [`VideoInfo`] from `ffprobe -show_streams -show_format -of json`.
pub fn parse_video_probe(json: &Value, path: &Path) -> MediaResult<VideoInfo> {
    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| MediaError::probe(path.display().to_string(), "no streams"))?;

    let video = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        .ok_or_else(|| MediaError::probe(path.display().to_string(), "no video stream"))?;

    let has_audio = streams
        .iter()
        .any(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("audio"));

    let width = video.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let height = video.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(MediaError::probe(path.display().to_string(), "missing dimensions"));
    }

    // r_frame_rate first; avg_frame_rate is 0/0 for some containers.
    let fps = ["r_frame_rate", "avg_frame_rate"]
        .iter()
        .filter_map(|key| video.get(*key).and_then(|v| v.as_str()))
        .find_map(parse_fps_fraction)
        .ok_or_else(|| MediaError::probe(path.display().to_string(), "missing frame rate"))?;

    let mut frame_total = string_field(video, "nb_frames")
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);

    // MKV and friends only carry a container duration.
    if frame_total == 0 {
        let duration = string_field(video, "duration")
            .or_else(|| json.get("format").and_then(|f| string_field(f, "duration")))
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);
        frame_total = (duration * fps).round() as u32;
    }

    Ok(VideoInfo {
        resolution: Resolution::new(width, height),
        fps,
        frame_total,
        has_audio,
    })
}

fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| *s != "N/A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(media_kind_from_extension(Path::new("a.PNG")), MediaKind::Image);
        assert_eq!(media_kind_from_extension(Path::new("a.mkv")), MediaKind::Video);
        assert_eq!(media_kind_from_extension(Path::new("a.flac")), MediaKind::Audio);
        assert_eq!(media_kind_from_extension(Path::new("a.txt")), MediaKind::Unknown);
        assert_eq!(media_kind_from_extension(Path::new("noext")), MediaKind::Unknown);
        assert_eq!(detect_media_kind(Path::new("/nonexistent/a.png")), MediaKind::Unknown);
    }

    #[test]
    fn parses_frame_rates() {
        assert!((parse_fps_fraction("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_fps_fraction("25"), Some(25.0));
        assert_eq!(parse_fps_fraction("0/0"), None);
        assert_eq!(parse_fps_fraction("abc"), None);
    }

    #[test]
    fn parses_video_probe() {
        let json = json!({
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720,
                 "r_frame_rate": "25/1", "nb_frames": "250"},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "10.0"}
        });
        let info = parse_video_probe(&json, Path::new("clip.mp4")).unwrap();
        assert_eq!(info.resolution, Resolution::new(1280, 720));
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_total, 250);
        assert!(info.has_audio);
    }

    #[test]
    fn estimates_frame_total_from_format_duration() {
        let json = json!({
            "streams": [
                {"codec_type": "video", "width": 640, "height": 360,
                 "r_frame_rate": "0/0", "avg_frame_rate": "30/1", "nb_frames": "N/A"}
            ],
            "format": {"duration": "2.0"}
        });
        let info = parse_video_probe(&json, Path::new("clip.mkv")).unwrap();
        assert_eq!(info.fps, 30.0);
        assert_eq!(info.frame_total, 60);
        assert!(!info.has_audio);
    }

    #[test]
    fn rejects_probe_without_video() {
        let json = json!({"streams": [{"codec_type": "audio"}]});
        assert!(parse_video_probe(&json, Path::new("song.mp3")).is_err());
    }
}
