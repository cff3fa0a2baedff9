//! Single-step pipeline controller.
//!
//! Runs one target through the processor chain:
//!
//! ```text
//! pre-process ─> prime references ─┬─> image run ─┐
//!                                  └─> video run ─┴─> outcome + elapsed
//! ```
//!
//! Every exit is a [`ProcessOutcome`]. Once the workspace exists it is
//! cleared, and the process state ended, on every path out.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::context::RunContext;
use super::outcome::{ProcessOutcome, RunReport};
use super::processor::Processor;
use super::reference_faces::{ReferenceFaceCache, ORIGIN_KEY};
use crate::media::{
    ContentAnalyser, ExtractFrames, FaceAnalyser, MediaToolkit, MergeVideo, ReplaceAudio,
    RestoreAudio,
};
use crate::models::{
    frame_has_content, restrict_image_resolution, restrict_trim_frame, restrict_video_fps,
    restrict_video_resolution, select_face, Face, MediaKind, ProcessMode, VisionFrame,
};
use crate::process_state::ProcessState;
use crate::workspace::TempWorkspace;

/// Drives one pipeline run against its collaborators.
pub struct PipelineController {
    toolkit: Box<dyn MediaToolkit>,
    content_analyser: Box<dyn ContentAnalyser>,
    face_analyser: Box<dyn FaceAnalyser>,
    state: Arc<ProcessState>,
    workspace: TempWorkspace,
}

impl PipelineController {
    pub fn new(
        toolkit: Box<dyn MediaToolkit>,
        content_analyser: Box<dyn ContentAnalyser>,
        face_analyser: Box<dyn FaceAnalyser>,
        state: Arc<ProcessState>,
        workspace: TempWorkspace,
    ) -> Self {
        Self {
            toolkit,
            content_analyser,
            face_analyser,
            state,
            workspace,
        }
    }

    pub fn toolkit(&self) -> &dyn MediaToolkit {
        self.toolkit.as_ref()
    }

    pub fn process_state(&self) -> &Arc<ProcessState> {
        &self.state
    }

    pub fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    /// Run the target in `ctx` through `processors`.
    pub fn run(
        &self,
        ctx: &RunContext,
        processors: &mut [Box<dyn Processor>],
        reference_faces: &mut ReferenceFaceCache,
    ) -> RunReport {
        let started = Instant::now();
        let outcome = self.run_stages(ctx, processors, reference_faces);
        let elapsed = started.elapsed();

        if outcome.is_success() {
            ctx.logger.success(&format!(
                "Processing succeeded in {:.2} seconds",
                elapsed.as_secs_f64()
            ));
        } else {
            ctx.logger
                .warn(&format!("Processing ended: {} (code {})", outcome, outcome.code()));
        }

        RunReport { outcome, elapsed }
    }

    fn run_stages(
        &self,
        ctx: &RunContext,
        processors: &mut [Box<dyn Processor>],
        reference_faces: &mut ReferenceFaceCache,
    ) -> ProcessOutcome {
        for processor in processors.iter_mut() {
            if !processor.pre_process(ctx, ProcessMode::Output) {
                ctx.logger
                    .error(&format!("Processor '{}' refused to run", processor.name()));
                return ProcessOutcome::PreProcessFailed;
            }
        }

        if ctx.face_selector_mode.uses_reference() && !reference_faces.contains(ORIGIN_KEY) {
            self.prime_reference_faces(ctx, processors, reference_faces);
        }

        match self.toolkit.media_kind(&ctx.target_path) {
            MediaKind::Image => self.process_image(ctx, processors, reference_faces),
            MediaKind::Video => self.process_video(ctx, processors, reference_faces),
            kind => {
                ctx.logger.warn(&format!(
                    "Target {} is {}, nothing to process",
                    ctx.target_path.display(),
                    kind
                ));
                ProcessOutcome::Success
            }
        }
    }

    /// Pick reference faces from the target before processing.
    ///
    /// Failures here only mean fewer references; they never fail the run.
    fn prime_reference_faces(
        &self,
        ctx: &RunContext,
        processors: &[Box<dyn Processor>],
        reference_faces: &mut ReferenceFaceCache,
    ) {
        let source_frames = self.toolkit.read_static_images(&ctx.source_paths);
        let source_face = self.face_analyser.average_face(&source_frames);

        let reference_frame = match self.toolkit.media_kind(&ctx.target_path) {
            MediaKind::Video => self
                .toolkit
                .read_video_frame(&ctx.target_path, ctx.reference_frame_number),
            MediaKind::Image => self.toolkit.read_image(&ctx.target_path),
            _ => None,
        };
        let Some(reference_frame) = reference_frame else {
            ctx.logger.debug("No reference frame available");
            return;
        };

        let Some(reference_face) = self.pick_face(ctx, &reference_frame) else {
            ctx.logger.debug("No reference face found");
            return;
        };
        reference_faces.append(ORIGIN_KEY, reference_face.clone());

        let Some(source_face) = source_face else {
            return;
        };

        for processor in processors {
            let Some(frame) = processor.reference_frame(&source_face, &reference_face, &reference_frame)
            else {
                continue;
            };
            if !frame_has_content(&frame) {
                continue;
            }
            if let Some(face) = self.pick_face(ctx, &frame) {
                reference_faces.append(processor.name(), face);
            }
        }
    }

    fn pick_face(&self, ctx: &RunContext, frame: &VisionFrame) -> Option<Face> {
        let faces = self.face_analyser.detect_faces(frame);
        let faces = self
            .face_analyser
            .sort_and_filter(faces, ctx.face_selector_order);
        select_face(&faces, ctx.reference_face_position)
    }

    fn process_image(
        &self,
        ctx: &RunContext,
        processors: &mut [Box<dyn Processor>],
        reference_faces: &ReferenceFaceCache,
    ) -> ProcessOutcome {
        let target = ctx.target_path.as_path();
        let logger = &ctx.logger;

        if self.content_analyser.analyse_image(target) {
            logger.error("Content analysis rejected the target image");
            return ProcessOutcome::AnalysisRejected;
        }

        let Some(actual) = self.toolkit.probe_image(target) else {
            logger.error(&format!("Failed to read image {}", target.display()));
            return ProcessOutcome::ToolingFailure;
        };

        if let Err(outcome) = self.prepare_workspace(ctx) {
            return outcome;
        }
        let _session = self.state.begin();
        let _cleanup = self.workspace.guard(target);

        let temp_file = self.workspace.temp_file_path(target);
        let resolution = restrict_image_resolution(actual, ctx.output_image_resolution);

        logger.phase("Image");
        logger.info(&format!("Copying image with a resolution of {}", resolution));
        if !self.toolkit.copy_image(target, &temp_file, resolution) {
            logger.error("Copying image failed");
            return ProcessOutcome::ToolingFailure;
        }

        for processor in processors.iter_mut() {
            logger.section(processor.name());
            processor.process_image(ctx, reference_faces, &temp_file, &temp_file);
            processor.post_process();
        }
        if self.state.observe_stop() {
            logger.warn("Processing stopped");
            return ProcessOutcome::Cancelled;
        }

        logger.info(&format!("Finalizing image with a resolution of {}", resolution));
        if !self.toolkit.finalize_image(&temp_file, &ctx.output_path, resolution) {
            logger.warn("Finalizing image skipped");
        }

        self.clear_workspace(target);
        if !self.output_is(MediaKind::Image, &ctx.output_path) {
            logger.error("Processing to image failed");
            return ProcessOutcome::ToolingFailure;
        }

        ProcessOutcome::Success
    }

    fn process_video(
        &self,
        ctx: &RunContext,
        processors: &mut [Box<dyn Processor>],
        reference_faces: &ReferenceFaceCache,
    ) -> ProcessOutcome {
        let target = ctx.target_path.as_path();
        let logger = &ctx.logger;

        let Some(info) = self.toolkit.probe_video(target) else {
            logger.error(&format!("Failed to probe video {}", target.display()));
            return ProcessOutcome::ToolingFailure;
        };
        let trim = restrict_trim_frame(info.frame_total, ctx.trim_frame_start, ctx.trim_frame_end);

        if self.content_analyser.analyse_video(target, trim) {
            logger.error("Content analysis rejected the target video");
            return ProcessOutcome::AnalysisRejected;
        }

        if let Err(outcome) = self.prepare_workspace(ctx) {
            return outcome;
        }
        let _session = self.state.begin();
        let _cleanup = self.workspace.guard(target);

        let resolution = restrict_video_resolution(info.resolution, ctx.output_video_resolution);
        let fps = restrict_video_fps(info.fps, ctx.output_video_fps);
        let frame_pattern = self.workspace.frame_pattern(target, &ctx.temp_frame_format);

        logger.phase("Extracting");
        logger.info(&format!(
            "Extracting frames {}..{} with a resolution of {} and {} frames per second",
            trim.start, trim.end, resolution, fps
        ));
        let extracted = self.toolkit.extract_frames(&ExtractFrames {
            target,
            frame_pattern: &frame_pattern,
            resolution,
            fps,
            trim,
        });
        if !extracted {
            if self.state.observe_stop() {
                logger.warn("Processing stopped");
                return ProcessOutcome::Cancelled;
            }
            logger.error("Extracting frames failed");
            return ProcessOutcome::ToolingFailure;
        }

        let frames = match self.workspace.frame_paths(target, &ctx.temp_frame_format) {
            Ok(frames) if !frames.is_empty() => frames,
            Ok(_) => {
                logger.error("Temporary frames not found");
                return ProcessOutcome::ToolingFailure;
            }
            Err(e) => {
                logger.error(&format!("Listing temporary frames failed: {}", e));
                return ProcessOutcome::ToolingFailure;
            }
        };
        if self.state.observe_stop() {
            logger.warn("Processing stopped");
            return ProcessOutcome::Cancelled;
        }

        logger.phase("Processing");
        logger.info(&format!("{} frames", frames.len()));
        for processor in processors.iter_mut() {
            logger.section(processor.name());
            processor.process_video(ctx, reference_faces, &frames);
            processor.post_process();
        }
        if self.state.observe_stop() {
            logger.warn("Processing stopped");
            return ProcessOutcome::Cancelled;
        }

        logger.phase("Merging");
        let temp_video = self.workspace.temp_file_path(target);
        let merged = self.toolkit.merge_video(&MergeVideo {
            frame_pattern: &frame_pattern,
            output: &temp_video,
            resolution,
            fps,
        });
        if !merged {
            if self.state.observe_stop() {
                logger.warn("Processing stopped");
                return ProcessOutcome::Cancelled;
            }
            logger.error("Merging video failed");
            return ProcessOutcome::ToolingFailure;
        }
        if self.state.observe_stop() {
            logger.warn("Processing stopped");
            return ProcessOutcome::Cancelled;
        }

        logger.phase("Audio");
        if ctx.output_audio_volume == 0 {
            logger.info("Skipping audio");
            self.move_temp_video(ctx);
        } else {
            let audio_ok = match self.first_audio_source(ctx) {
                Some(audio) => {
                    logger.info(&format!("Replacing audio with {}", audio.display()));
                    self.toolkit.replace_audio(&ReplaceAudio {
                        video: &temp_video,
                        audio,
                        output: &ctx.output_path,
                        volume: ctx.output_audio_volume,
                    })
                }
                None if info.has_audio => {
                    logger.info("Restoring audio");
                    self.toolkit.restore_audio(&RestoreAudio {
                        target,
                        video: &temp_video,
                        output: &ctx.output_path,
                        trim,
                        fps: info.fps,
                        volume: ctx.output_audio_volume,
                    })
                }
                None => false,
            };

            if !audio_ok {
                if self.state.observe_stop() {
                    logger.warn("Processing stopped");
                    return ProcessOutcome::Cancelled;
                }
                logger.warn("Restoring audio skipped");
                self.move_temp_video(ctx);
            }
        }
        if self.state.observe_stop() {
            logger.warn("Processing stopped");
            self.discard_output(ctx);
            return ProcessOutcome::Cancelled;
        }

        self.clear_workspace(target);
        if !self.output_is(MediaKind::Video, &ctx.output_path) {
            logger.error("Processing to video failed");
            return ProcessOutcome::ToolingFailure;
        }

        ProcessOutcome::Success
    }

    /// Fresh workspace for the target. Nothing is left behind on failure.
    fn prepare_workspace(&self, ctx: &RunContext) -> Result<(), ProcessOutcome> {
        ctx.logger.debug("Creating temporary resources");
        match self.workspace.create(&ctx.target_path) {
            Ok(_) => Ok(()),
            Err(e) => {
                ctx.logger
                    .error(&format!("Creating temporary resources failed: {}", e));
                self.clear_workspace(&ctx.target_path);
                Err(ProcessOutcome::ToolingFailure)
            }
        }
    }

    fn clear_workspace(&self, target: &Path) {
        if let Err(e) = self.workspace.clear(target) {
            tracing::warn!("Failed to clear workspace for {}: {}", target.display(), e);
        }
    }

    /// Whether `output` exists with the expected kind and can be probed.
    fn output_is(&self, kind: MediaKind, output: &Path) -> bool {
        if self.toolkit.media_kind(output) != kind {
            return false;
        }
        match kind {
            MediaKind::Image => self.toolkit.probe_image(output).is_some(),
            MediaKind::Video => self.toolkit.probe_video(output).is_some(),
            _ => false,
        }
    }

    fn discard_output(&self, ctx: &RunContext) {
        match fs::remove_file(&ctx.output_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => ctx.logger.warn(&format!(
                "Removing partial output {} failed: {}",
                ctx.output_path.display(),
                e
            )),
        }
    }

    fn move_temp_video(&self, ctx: &RunContext) {
        if let Err(e) = self.workspace.move_out(&ctx.target_path, &ctx.output_path) {
            ctx.logger.warn(&format!("Moving temporary video failed: {}", e));
        }
    }

    fn first_audio_source<'a>(&self, ctx: &'a RunContext) -> Option<&'a Path> {
        ctx.source_paths
            .iter()
            .map(|p| p.as_path())
            .find(|p| self.toolkit.media_kind(p) == MediaKind::Audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::{BoundingBox, FaceSelectorMode, Resolution, TrimRange, VideoInfo};
    use crate::process_state::ProcessStatus;
    use parking_lot::Mutex;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    /// Calls recorded by the fake collaborators and processors.
    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Media toolkit that writes placeholder files instead of encoding.
    struct FakeToolkit {
        calls: CallLog,
        state: Arc<ProcessState>,
        fail_extract: bool,
        fail_merge: bool,
        fail_audio: bool,
        fail_finalize: bool,
        empty_merge: bool,
        stop_after_extract: bool,
        stop_in_merge: bool,
        stop_in_audio: bool,
        frame_count: usize,
        video_has_audio: bool,
    }

    impl FakeToolkit {
        fn new(calls: CallLog, state: Arc<ProcessState>) -> Self {
            Self {
                calls,
                state,
                fail_extract: false,
                fail_merge: false,
                fail_audio: false,
                fail_finalize: false,
                empty_merge: false,
                stop_after_extract: false,
                stop_in_merge: false,
                stop_in_audio: false,
                frame_count: 3,
                video_has_audio: true,
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }

        fn audio_step(&self, request_video: &Path, output: &Path) -> bool {
            if self.stop_in_audio {
                self.state.request_stop();
            }
            !self.fail_audio && fs::copy(request_video, output).is_ok()
        }
    }

    /// Placeholder media counts as readable when it has content.
    fn readable(path: &Path) -> bool {
        fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
    }

    impl MediaToolkit for FakeToolkit {
        fn media_kind(&self, path: &Path) -> MediaKind {
            crate::media::detect_media_kind(path)
        }

        fn probe_image(&self, path: &Path) -> Option<Resolution> {
            readable(path).then(|| Resolution::new(640, 480))
        }

        fn probe_video(&self, path: &Path) -> Option<VideoInfo> {
            readable(path).then(|| VideoInfo {
                resolution: Resolution::new(1280, 720),
                fps: 25.0,
                frame_total: 100,
                has_audio: self.video_has_audio,
            })
        }

        fn read_image(&self, _path: &Path) -> Option<VisionFrame> {
            Some(VisionFrame::from_pixel(4, 4, image::Rgb([9, 9, 9])))
        }

        fn read_video_frame(&self, _path: &Path, frame_number: u32) -> Option<VisionFrame> {
            self.record(format!("read_video_frame:{}", frame_number));
            Some(VisionFrame::from_pixel(4, 4, image::Rgb([9, 9, 9])))
        }

        fn copy_image(&self, _target: &Path, temp: &Path, resolution: Resolution) -> bool {
            self.record(format!("copy_image:{}", resolution));
            fs::write(temp, b"image").is_ok()
        }

        fn finalize_image(&self, temp: &Path, output: &Path, _resolution: Resolution) -> bool {
            self.record("finalize_image");
            !self.fail_finalize && fs::copy(temp, output).is_ok()
        }

        fn extract_frames(&self, request: &ExtractFrames<'_>) -> bool {
            self.record(format!("extract_frames:{}..{}", request.trim.start, request.trim.end));
            if self.stop_after_extract {
                self.state.request_stop();
            }
            if self.fail_extract {
                return false;
            }
            let Some(dir) = request.frame_pattern.parent() else {
                return false;
            };
            for i in 1..=self.frame_count {
                if fs::write(dir.join(format!("{:08}.png", i)), b"frame").is_err() {
                    return false;
                }
            }
            true
        }

        fn merge_video(&self, request: &MergeVideo<'_>) -> bool {
            self.record("merge_video");
            if self.stop_in_merge {
                self.state.request_stop();
            }
            let content: &[u8] = if self.empty_merge { b"" } else { b"video" };
            !self.fail_merge && fs::write(request.output, content).is_ok()
        }

        fn replace_audio(&self, request: &ReplaceAudio<'_>) -> bool {
            self.record(format!("replace_audio:{}", request.audio.display()));
            self.audio_step(request.video, request.output)
        }

        fn restore_audio(&self, request: &RestoreAudio<'_>) -> bool {
            self.record("restore_audio");
            self.audio_step(request.video, request.output)
        }
    }

    struct FakeContent {
        flag: bool,
    }

    impl ContentAnalyser for FakeContent {
        fn analyse_image(&self, _path: &Path) -> bool {
            self.flag
        }

        fn analyse_video(&self, _path: &Path, _trim: TrimRange) -> bool {
            self.flag
        }
    }

    /// Finds one face per frame, positioned by the frame's first pixel.
    struct FakeFaces {
        calls: CallLog,
    }

    impl FaceAnalyser for FakeFaces {
        fn detect_faces(&self, frame: &VisionFrame) -> Vec<Face> {
            self.calls.lock().push("detect_faces".to_string());
            let x = frame.get_pixel(0, 0)[0] as f32;
            vec![Face {
                bounding_box: BoundingBox {
                    x1: x,
                    y1: 0.0,
                    x2: x + 1.0,
                    y2: 1.0,
                },
                score: 0.9,
                embedding: vec![x],
            }]
        }
    }

    struct RecordingProcessor {
        name: &'static str,
        calls: CallLog,
        accept: bool,
        stop_on_process: Option<Arc<ProcessState>>,
        abstract_frame: bool,
    }

    impl RecordingProcessor {
        fn new(name: &'static str, calls: CallLog) -> Self {
            Self {
                name,
                calls,
                accept: true,
                stop_on_process: None,
                abstract_frame: false,
            }
        }
    }

    impl Processor for RecordingProcessor {
        fn name(&self) -> &str {
            self.name
        }

        fn pre_process(&mut self, _ctx: &RunContext, mode: ProcessMode) -> bool {
            self.calls.lock().push(format!("{}:pre_process:{}", self.name, mode));
            self.accept
        }

        fn process_image(&mut self, _: &RunContext, _: &ReferenceFaceCache, input: &Path, output: &Path) {
            self.calls.lock().push(format!("{}:process_image", self.name));
            assert_eq!(input, output);
            if let Some(state) = &self.stop_on_process {
                state.request_stop();
            }
        }

        fn process_video(&mut self, _: &RunContext, _: &ReferenceFaceCache, frames: &[PathBuf]) {
            self.calls
                .lock()
                .push(format!("{}:process_video:{}", self.name, frames.len()));
            if let Some(state) = &self.stop_on_process {
                state.request_stop();
            }
        }

        fn post_process(&mut self) {
            self.calls.lock().push(format!("{}:post_process", self.name));
        }

        fn reference_frame(&self, _: &Face, _: &Face, _: &VisionFrame) -> Option<VisionFrame> {
            self.abstract_frame
                .then(|| VisionFrame::from_pixel(4, 4, image::Rgb([42, 0, 0])))
        }
    }

    struct Fixture {
        dir: TempDir,
        calls: CallLog,
        state: Arc<ProcessState>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
                calls: Arc::new(Mutex::new(Vec::new())),
                state: Arc::new(ProcessState::new()),
            }
        }

        fn toolkit(&self) -> FakeToolkit {
            FakeToolkit::new(self.calls.clone(), self.state.clone())
        }

        fn controller(&self, toolkit: FakeToolkit, flag_content: bool) -> PipelineController {
            PipelineController::new(
                Box::new(toolkit),
                Box::new(FakeContent { flag: flag_content }),
                Box::new(FakeFaces {
                    calls: self.calls.clone(),
                }),
                self.state.clone(),
                TempWorkspace::new(self.dir.path().join("temp")),
            )
        }

        fn media(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, b"media").unwrap();
            path
        }

        fn context(&self, target: &Path, output_name: &str) -> RunContext {
            let mut settings = Settings::default();
            settings.processing.face_selector_mode = FaceSelectorMode::Many;
            RunContext::detached(target, self.dir.path().join(output_name), &settings)
        }

        fn processor(&self, name: &'static str) -> RecordingProcessor {
            RecordingProcessor::new(name, self.calls.clone())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn called(&self, prefix: &str) -> bool {
            self.calls().iter().any(|c| c.starts_with(prefix))
        }

        fn workspace_is_clear(&self, controller: &PipelineController, target: &Path) -> bool {
            !controller.workspace().directory(target).exists()
        }
    }

    fn run(
        controller: &PipelineController,
        ctx: &RunContext,
        processors: Vec<RecordingProcessor>,
    ) -> ProcessOutcome {
        let mut processors: Vec<Box<dyn Processor>> = processors
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn Processor>)
            .collect();
        let mut cache = ReferenceFaceCache::new();
        controller.run(ctx, &mut processors, &mut cache).outcome
    }

    #[test]
    fn video_with_empty_chain_succeeds() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let controller = fx.controller(fx.toolkit(), false);
        let ctx = fx.context(&target, "out.mp4");

        let outcome = run(&controller, &ctx, Vec::new());

        assert_eq!(outcome, ProcessOutcome::Success);
        assert!(ctx.output_path.is_file());
        assert!(fx.called("restore_audio"));
        assert!(fx.workspace_is_clear(&controller, &target));
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
    }

    #[test]
    fn extraction_failure_is_tooling_failure() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.fail_extract = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        let outcome = run(&controller, &ctx, vec![fx.processor("swap")]);

        assert_eq!(outcome, ProcessOutcome::ToolingFailure);
        assert!(!fx.called("swap:process_video"));
        assert!(fx.workspace_is_clear(&controller, &target));
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
    }

    #[test]
    fn stop_during_failed_extraction_cancels() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.stop_after_extract = true;
        toolkit.fail_extract = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        let outcome = run(&controller, &ctx, Vec::new());

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
        assert!(fx.workspace_is_clear(&controller, &target));
    }

    #[test]
    fn stop_after_successful_extraction_skips_chain() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.stop_after_extract = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        let outcome = run(&controller, &ctx, vec![fx.processor("swap")]);

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert!(!fx.called("swap:process_video"));
        assert!(!fx.called("merge_video"));
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
        assert!(fx.workspace_is_clear(&controller, &target));
    }

    #[test]
    fn stop_during_merge_cancels_before_audio() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.stop_in_merge = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        let outcome = run(&controller, &ctx, Vec::new());

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert!(!fx.called("restore_audio"));
        assert!(!ctx.output_path.exists());
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
        assert!(fx.workspace_is_clear(&controller, &target));
    }

    #[test]
    fn stop_during_audio_discards_written_output() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.stop_in_audio = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        let outcome = run(&controller, &ctx, Vec::new());

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert!(fx.called("restore_audio"));
        assert!(!ctx.output_path.exists());
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
        assert!(fx.workspace_is_clear(&controller, &target));
    }

    #[test]
    fn stop_during_processor_chain_cancels_and_cleans_up() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let controller = fx.controller(fx.toolkit(), false);
        let ctx = fx.context(&target, "out.mp4");

        let mut processor = fx.processor("swap");
        processor.stop_on_process = Some(fx.state.clone());
        let outcome = run(&controller, &ctx, vec![processor]);

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert!(fx.called("swap:post_process"));
        assert!(!fx.called("merge_video"));
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
        assert!(fx.workspace_is_clear(&controller, &target));
        assert!(!ctx.output_path.exists());
    }

    #[test]
    fn zero_volume_skips_audio() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let controller = fx.controller(fx.toolkit(), false);
        let mut ctx = fx.context(&target, "out.mp4");
        ctx.output_audio_volume = 0;
        ctx.source_paths = vec![fx.media("voice.wav")];

        let outcome = run(&controller, &ctx, Vec::new());

        assert_eq!(outcome, ProcessOutcome::Success);
        assert!(!fx.called("replace_audio"));
        assert!(!fx.called("restore_audio"));
        assert_eq!(fs::read(&ctx.output_path).unwrap(), b"video");
    }

    #[test]
    fn source_audio_replaces_target_audio() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let voice = fx.media("voice.wav");
        let controller = fx.controller(fx.toolkit(), false);
        let mut ctx = fx.context(&target, "out.mp4");
        ctx.source_paths = vec![fx.media("face.jpg"), voice.clone()];

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::Success);
        assert!(fx.called(&format!("replace_audio:{}", voice.display())));
        assert!(!fx.called("restore_audio"));
    }

    #[test]
    fn audio_failure_degrades_to_silent_output() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.fail_audio = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::Success);
        assert_eq!(fs::read(&ctx.output_path).unwrap(), b"video");
    }

    #[test]
    fn merge_failure_is_tooling_failure() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.fail_merge = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::ToolingFailure);
        assert!(fx.workspace_is_clear(&controller, &target));
    }

    #[test]
    fn unreadable_video_output_is_tooling_failure() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.empty_merge = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::ToolingFailure);
        assert!(ctx.output_path.is_file());
    }

    #[test]
    fn missing_frames_is_tooling_failure() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let mut toolkit = fx.toolkit();
        toolkit.frame_count = 0;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.mp4");

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::ToolingFailure);
    }

    #[test]
    fn trim_window_is_clamped_before_extraction() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let controller = fx.controller(fx.toolkit(), false);
        let mut ctx = fx.context(&target, "out.mp4");
        ctx.trim_frame_start = Some(10);
        ctx.trim_frame_end = Some(500);

        run(&controller, &ctx, Vec::new());
        assert!(fx.called("extract_frames:10..100"));
    }

    #[test]
    fn pre_process_refusal_stops_before_any_work() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let controller = fx.controller(fx.toolkit(), false);
        let ctx = fx.context(&target, "out.mp4");

        let mut refusing = fx.processor("b");
        refusing.accept = false;
        let outcome = run(&controller, &ctx, vec![fx.processor("a"), refusing, fx.processor("c")]);

        assert_eq!(outcome, ProcessOutcome::PreProcessFailed);
        assert_eq!(
            fx.calls(),
            vec!["a:pre_process:output".to_string(), "b:pre_process:output".to_string()]
        );
        assert!(!controller.workspace().directory(&target).exists());
    }

    #[test]
    fn flagged_content_is_rejected() {
        let fx = Fixture::new();
        let target = fx.media("photo.png");
        let controller = fx.controller(fx.toolkit(), true);
        let ctx = fx.context(&target, "out.png");

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::AnalysisRejected);
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
        assert!(!fx.called("copy_image"));
    }

    #[test]
    fn image_runs_chain_and_finalizes() {
        let fx = Fixture::new();
        let target = fx.media("photo.png");
        let controller = fx.controller(fx.toolkit(), false);
        let mut ctx = fx.context(&target, "out.png");
        ctx.output_image_resolution = Some(Resolution::new(4000, 3000));

        let outcome = run(&controller, &ctx, vec![fx.processor("swap"), fx.processor("enhance")]);

        assert_eq!(outcome, ProcessOutcome::Success);
        let calls = fx.calls();
        let order: Vec<&str> = calls
            .iter()
            .map(String::as_str)
            .filter(|c| c.contains("process_image") || c.contains("post_process"))
            .collect();
        assert_eq!(
            order,
            vec!["swap:process_image", "swap:post_process", "enhance:process_image", "enhance:post_process"]
        );
        // Requests larger than the source fall back to the source size.
        assert!(fx.called("copy_image:640x480"));
        assert!(ctx.output_path.is_file());
        assert!(fx.workspace_is_clear(&controller, &target));
    }

    #[test]
    fn stale_image_output_is_not_success() {
        let fx = Fixture::new();
        let target = fx.media("photo.png");
        let mut toolkit = fx.toolkit();
        toolkit.fail_finalize = true;
        let controller = fx.controller(toolkit, false);
        let ctx = fx.context(&target, "out.png");
        fs::write(&ctx.output_path, b"").unwrap();

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::ToolingFailure);
        assert!(fx.called("finalize_image"));
    }

    #[test]
    fn image_stop_after_chain_cancels() {
        let fx = Fixture::new();
        let target = fx.media("photo.png");
        let controller = fx.controller(fx.toolkit(), false);
        let ctx = fx.context(&target, "out.png");

        let mut processor = fx.processor("swap");
        processor.stop_on_process = Some(fx.state.clone());

        assert_eq!(run(&controller, &ctx, vec![processor]), ProcessOutcome::Cancelled);
        assert!(!fx.called("finalize_image"));
        assert_eq!(fx.state.status(), ProcessStatus::Idle);
    }

    #[test]
    fn unsupported_target_is_a_no_op() {
        let fx = Fixture::new();
        let target = fx.media("notes.txt");
        let controller = fx.controller(fx.toolkit(), false);
        let ctx = fx.context(&target, "out.txt");

        assert_eq!(run(&controller, &ctx, Vec::new()), ProcessOutcome::Success);
        assert!(!fx.called("copy_image"));
        assert!(!fx.called("extract_frames"));
    }

    #[test]
    fn reference_mode_primes_origin_and_processor_faces() {
        let fx = Fixture::new();
        let target = fx.media("clip.mp4");
        let controller = fx.controller(fx.toolkit(), false);
        let mut ctx = fx.context(&target, "out.mp4");
        ctx.face_selector_mode = FaceSelectorMode::Reference;
        ctx.reference_frame_number = 7;
        ctx.source_paths = vec![fx.media("face.jpg")];

        let mut swapper = fx.processor("swap");
        swapper.abstract_frame = true;
        let mut processors: Vec<Box<dyn Processor>> = vec![Box::new(swapper)];
        let mut cache = ReferenceFaceCache::new();

        let report = controller.run(&ctx, &mut processors, &mut cache);

        assert_eq!(report.outcome, ProcessOutcome::Success);
        assert!(fx.called("read_video_frame:7"));
        assert_eq!(cache.origin().map(<[Face]>::len), Some(1));
        assert_eq!(cache.get("swap").unwrap()[0].bounding_box.x1, 42.0);
    }

    #[test]
    fn primed_cache_is_not_primed_again() {
        let fx = Fixture::new();
        let target = fx.media("photo.png");
        let controller = fx.controller(fx.toolkit(), false);
        let mut ctx = fx.context(&target, "out.png");
        ctx.face_selector_mode = FaceSelectorMode::Reference;

        let mut cache = ReferenceFaceCache::new();
        cache.append(ORIGIN_KEY, Face::default());
        let mut processors: Vec<Box<dyn Processor>> = Vec::new();
        controller.run(&ctx, &mut processors, &mut cache);

        assert!(!fx.called("detect_faces"));
        assert_eq!(cache.origin().map(<[Face]>::len), Some(1));
    }
}
