//! Per-step run configuration.
//!
//! A [`RunContext`] is built once per step from the configured defaults
//! and the step's argument snapshot, then passed by reference to the
//! controller and every processor call.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::errors::{StepError, StepResult};
use crate::config::Settings;
use crate::jobs::StepArgs;
use crate::logging::{JobLogger, LogConfig};
use crate::models::{FaceSelectorMode, FaceSelectorOrder, Resolution};

/// Recognised snapshot keys. Anything else in the snapshot is ignored.
#[derive(Debug, Default, Deserialize)]
struct StepOptions {
    #[serde(default)]
    source_paths: Vec<PathBuf>,
    target_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    processors: Option<Vec<String>>,
    temp_frame_format: Option<String>,
    face_selector_mode: Option<FaceSelectorMode>,
    face_selector_order: Option<FaceSelectorOrder>,
    reference_face_position: Option<usize>,
    reference_frame_number: Option<u32>,
    output_image_resolution: Option<Resolution>,
    output_video_resolution: Option<Resolution>,
    output_video_fps: Option<f64>,
    output_audio_volume: Option<u32>,
    trim_frame_start: Option<u32>,
    trim_frame_end: Option<u32>,
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job_id: String,
    pub step_index: usize,
    pub source_paths: Vec<PathBuf>,
    pub target_path: PathBuf,
    pub output_path: PathBuf,
    /// Processor names in chain order.
    pub processors: Vec<String>,
    pub temp_frame_format: String,
    pub face_selector_mode: FaceSelectorMode,
    pub face_selector_order: FaceSelectorOrder,
    pub reference_face_position: usize,
    pub reference_frame_number: u32,
    pub output_image_resolution: Option<Resolution>,
    pub output_video_resolution: Option<Resolution>,
    pub output_video_fps: Option<f64>,
    /// Percent; zero drops audio.
    pub output_audio_volume: u32,
    pub trim_frame_start: Option<u32>,
    pub trim_frame_end: Option<u32>,
    pub logger: Arc<JobLogger>,
}

impl RunContext {
    /// Context for a target using only configured defaults.
    pub fn new(
        target_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        settings: &Settings,
        logger: Arc<JobLogger>,
    ) -> Self {
        let processing = &settings.processing;
        let output = &settings.output;
        Self {
            job_id: logger.job_name().to_string(),
            step_index: 0,
            source_paths: Vec::new(),
            target_path: target_path.into(),
            output_path: output_path.into(),
            processors: processing.processors.clone(),
            temp_frame_format: processing.temp_frame_format.clone(),
            face_selector_mode: processing.face_selector_mode,
            face_selector_order: processing.face_selector_order,
            reference_face_position: processing.reference_face_position,
            reference_frame_number: processing.reference_frame_number,
            output_image_resolution: output.image_resolution,
            output_video_resolution: output.video_resolution,
            output_video_fps: output.video_fps,
            output_audio_volume: output.audio_volume,
            trim_frame_start: None,
            trim_frame_end: None,
            logger,
        }
    }

    /// Build the context for step `step_index` of `job_id`.
    ///
    /// Snapshot values override the defaults in `settings`. `target_path`
    /// and `output_path` are required. An `output_path` naming an existing
    /// directory resolves to `<dir>/<target file name>`.
    pub fn from_step(
        job_id: &str,
        step_index: usize,
        args: &StepArgs,
        settings: &Settings,
        logger: Arc<JobLogger>,
    ) -> StepResult<Self> {
        let options: StepOptions = serde_json::from_value(args.to_value())
            .map_err(|e| StepError::invalid_args(e.to_string()))?;

        let target_path = options
            .target_path
            .ok_or_else(|| StepError::missing_arg("target_path"))?;
        let output_path = options
            .output_path
            .ok_or_else(|| StepError::missing_arg("output_path"))?;
        let output_path = normalize_output_path(&target_path, output_path);

        let mut ctx = Self::new(target_path, output_path, settings, logger);
        ctx.job_id = job_id.to_string();
        ctx.step_index = step_index;
        ctx.source_paths = options.source_paths;

        if let Some(processors) = options.processors {
            ctx.processors = processors;
        }
        if let Some(format) = options.temp_frame_format {
            ctx.temp_frame_format = format;
        }
        if let Some(mode) = options.face_selector_mode {
            ctx.face_selector_mode = mode;
        }
        if let Some(order) = options.face_selector_order {
            ctx.face_selector_order = order;
        }
        if let Some(position) = options.reference_face_position {
            ctx.reference_face_position = position;
        }
        if let Some(frame) = options.reference_frame_number {
            ctx.reference_frame_number = frame;
        }
        ctx.output_image_resolution = options.output_image_resolution.or(ctx.output_image_resolution);
        ctx.output_video_resolution = options.output_video_resolution.or(ctx.output_video_resolution);
        ctx.output_video_fps = options.output_video_fps.or(ctx.output_video_fps);
        if let Some(volume) = options.output_audio_volume {
            ctx.output_audio_volume = volume;
        }
        ctx.trim_frame_start = options.trim_frame_start;
        ctx.trim_frame_end = options.trim_frame_end;

        Ok(ctx)
    }

    /// Detached-logger context, handy for previews and tests.
    pub fn detached(
        target_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        settings: &Settings,
    ) -> Self {
        let logger = Arc::new(JobLogger::detached(
            "detached",
            LogConfig::from_settings(&settings.logging),
        ));
        Self::new(target_path, output_path, settings, logger)
    }
}

fn normalize_output_path(target_path: &std::path::Path, output_path: PathBuf) -> PathBuf {
    if output_path.is_dir() {
        if let Some(file_name) = target_path.file_name() {
            return output_path.join(file_name);
        }
    }
    output_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logger() -> Arc<JobLogger> {
        Arc::new(JobLogger::detached("job", LogConfig::default()))
    }

    #[test]
    fn snapshot_overrides_defaults() {
        let mut settings = Settings::default();
        settings.processing.processors = vec!["face_swapper".to_string()];
        settings.output.audio_volume = 80;

        let args = StepArgs::new()
            .with("target_path", "/in/clip.mp4")
            .with("output_path", "/out/clip.mp4")
            .with("source_paths", json!(["/in/face.jpg"]))
            .with("processors", json!(["face_enhancer"]))
            .with("output_video_resolution", "1280x720")
            .with("trim_frame_start", 10)
            .with("unrelated_key", true);

        let ctx = RunContext::from_step("job", 2, &args, &settings, logger()).unwrap();
        assert_eq!(ctx.step_index, 2);
        assert_eq!(ctx.processors, vec!["face_enhancer"]);
        assert_eq!(ctx.source_paths, vec![PathBuf::from("/in/face.jpg")]);
        assert_eq!(ctx.output_video_resolution, Some(Resolution::new(1280, 720)));
        assert_eq!(ctx.output_audio_volume, 80);
        assert_eq!(ctx.trim_frame_start, Some(10));
        assert_eq!(ctx.trim_frame_end, None);
    }

    #[test]
    fn missing_target_is_rejected() {
        let args = StepArgs::new().with("output_path", "/out/a.png");
        let err = RunContext::from_step("job", 0, &args, &Settings::default(), logger()).unwrap_err();
        assert!(matches!(err, StepError::MissingArg(ref name) if name == "target_path"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let args = StepArgs::new()
            .with("target_path", "/in/a.png")
            .with("output_path", "/out/a.png")
            .with("output_image_resolution", "huge");
        let err = RunContext::from_step("job", 0, &args, &Settings::default(), logger()).unwrap_err();
        assert!(matches!(err, StepError::InvalidArgs(_)));
    }

    #[test]
    fn directory_output_takes_target_name() {
        let dir = tempfile::tempdir().unwrap();
        let args = StepArgs::new()
            .with("target_path", "/in/photo.jpg")
            .with("output_path", dir.path().to_string_lossy().to_string());

        let ctx = RunContext::from_step("job", 0, &args, &Settings::default(), logger()).unwrap();
        assert_eq!(ctx.output_path, dir.path().join("photo.jpg"));
    }
}
