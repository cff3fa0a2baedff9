//! Job-level entry point wiring the runner to the pipeline.
//!
//! The dispatcher is the [`StepExecutor`] handed to [`JobRunner`]. For each
//! step it:
//! 1. Clears the reference face cache
//! 2. Builds a [`RunContext`] from the step's snapshot
//! 3. Resolves and pre-checks the processor chain
//! 4. Runs the [`PipelineController`] and reports the outcome as a bool

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::batch::BatchRequest;
use super::context::RunContext;
use super::controller::PipelineController;
use super::errors::{StepError, StepResult};
use super::outcome::{ProcessOutcome, RunReport};
use super::processor::ProcessorRegistry;
use super::reference_faces::ReferenceFaceCache;
use crate::config::{ConfigManager, Settings};
use crate::jobs::{suggest_job_id, JobResult, JobRunner, JobStore, StepArgs, StepExecutor};
use crate::logging::{JobLogger, LogConfig};
use crate::media::{FfmpegToolkit, NoFaceAnalyser, PermissiveAnalyser};
use crate::process_state::ProcessState;
use crate::workspace::TempWorkspace;

/// Observer receiving every job log line.
pub type SharedLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub struct Dispatcher {
    settings: Settings,
    registry: ProcessorRegistry,
    controller: PipelineController,
    logs_folder: Option<PathBuf>,
    log_callback: Option<SharedLogCallback>,
    /// One logger per job, shared by its steps.
    loggers: HashMap<String, Arc<JobLogger>>,
    reference_faces: ReferenceFaceCache,
    last_report: Option<RunReport>,
}

impl Dispatcher {
    pub fn new(settings: Settings, registry: ProcessorRegistry, controller: PipelineController) -> Self {
        Self {
            settings,
            registry,
            controller,
            logs_folder: None,
            log_callback: None,
            loggers: HashMap::new(),
            reference_faces: ReferenceFaceCache::new(),
            last_report: None,
        }
    }

    /// Dispatcher backed by ffmpeg, using the configured paths.
    pub fn with_defaults(config: &ConfigManager, registry: ProcessorRegistry) -> Self {
        let controller = PipelineController::new(
            Box::new(FfmpegToolkit::new()),
            Box::new(PermissiveAnalyser),
            Box::new(NoFaceAnalyser),
            Arc::new(ProcessState::new()),
            TempWorkspace::new(config.temp_root()),
        );
        Self::new(config.settings().clone(), registry, controller)
            .with_logs_folder(config.logs_folder())
    }

    /// Write per-job log files under `folder`.
    pub fn with_logs_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.logs_folder = Some(folder.into());
        self
    }

    pub fn with_log_callback(mut self, callback: SharedLogCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Shared state; hand a clone to whoever may request a stop.
    pub fn process_state(&self) -> Arc<ProcessState> {
        Arc::clone(self.controller.process_state())
    }

    /// Report of the most recent step that reached the pipeline.
    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report
    }

    pub fn reference_faces(&self) -> &ReferenceFaceCache {
        &self.reference_faces
    }

    /// Run one step through the pipeline.
    ///
    /// Returns `Err` when the step could not start: a bad snapshot, an
    /// unknown processor or a failed pre-check.
    pub fn run_step(
        &mut self,
        job_id: &str,
        step_index: usize,
        args: &StepArgs,
    ) -> StepResult<ProcessOutcome> {
        self.reference_faces.clear();
        self.last_report = None;

        let logger = self.logger_for(job_id);
        logger.phase(&format!("Step {}", step_index + 1));

        let ctx = RunContext::from_step(job_id, step_index, args, &self.settings, logger)?;
        let mut processors = self.registry.resolve(&ctx.processors)?;

        if !self.controller.toolkit().pre_check() {
            return Err(StepError::pre_check_failed("media toolkit"));
        }
        if let Some(processor) = processors.iter().find(|p| !p.pre_check()) {
            return Err(StepError::pre_check_failed(format!(
                "processor '{}'",
                processor.name()
            )));
        }

        let report = self
            .controller
            .run(&ctx, &mut processors, &mut self.reference_faces);
        self.last_report = Some(report);
        Ok(report.outcome)
    }

    pub fn run_job(&mut self, store: &mut JobStore, job_id: &str) -> JobResult<bool> {
        let result = JobRunner::new(store).run_job(job_id, self);
        self.release_logger(job_id);
        result
    }

    /// Run every queued job, stopping at the first failure when the
    /// configured batch policy says so.
    pub fn run_all_queued(&mut self, store: &mut JobStore) -> bool {
        let halt_on_error = self.settings.jobs.halt_on_error;
        let succeeded = JobRunner::new(store).run_all_queued(self, halt_on_error);
        self.release_all_loggers();
        succeeded
    }

    pub fn retry_job(&mut self, store: &mut JobStore, job_id: &str) -> JobResult<bool> {
        let result = JobRunner::new(store).retry_job(job_id, self);
        self.release_logger(job_id);
        result
    }

    pub fn retry_all_failed(&mut self, store: &mut JobStore) -> bool {
        let halt_on_error = self.settings.jobs.halt_on_error;
        let succeeded = JobRunner::new(store).retry_all_failed(self, halt_on_error);
        self.release_all_loggers();
        succeeded
    }

    /// Create, submit and run a one-step `headless-…` job.
    pub fn run_headless(&mut self, store: &mut JobStore, args: StepArgs) -> JobResult<bool> {
        let job_id = unused_job_id(store, "headless");
        store.create_job(&job_id)?;
        store.add_step(&job_id, args)?;
        store.submit_job(&job_id)?;
        self.run_job(store, &job_id)
    }

    /// Create, submit and run a `batch-…` job expanded from file patterns.
    ///
    /// Returns `Ok(false)` without creating a job when no target matches.
    pub fn run_batch(&mut self, store: &mut JobStore, request: &BatchRequest) -> JobResult<bool> {
        let steps = request.expand()?;
        if steps.is_empty() {
            tracing::warn!("No targets match '{}'", request.target_pattern);
            return Ok(false);
        }

        let job_id = unused_job_id(store, "batch");
        store.create_job(&job_id)?;
        for args in steps {
            store.add_step(&job_id, args)?;
        }
        store.submit_job(&job_id)?;
        tracing::info!("Running batch job '{}'", job_id);
        self.run_job(store, &job_id)
    }

    fn logger_for(&mut self, job_id: &str) -> Arc<JobLogger> {
        if let Some(logger) = self.loggers.get(job_id) {
            return Arc::clone(logger);
        }

        let config = LogConfig::from_settings(&self.settings.logging);
        let logger = match &self.logs_folder {
            Some(folder) => {
                match JobLogger::new(job_id, folder, config.clone(), self.boxed_callback()) {
                    Ok(logger) => logger,
                    Err(e) => {
                        tracing::warn!("Could not open log file for job '{}': {}", job_id, e);
                        self.detached_logger(job_id, config)
                    }
                }
            }
            None => self.detached_logger(job_id, config),
        };

        let logger = Arc::new(logger);
        self.loggers.insert(job_id.to_string(), Arc::clone(&logger));
        logger
    }

    fn detached_logger(&self, job_id: &str, config: LogConfig) -> JobLogger {
        let logger = JobLogger::detached(job_id, config);
        logger.set_callback(self.boxed_callback());
        logger
    }

    fn boxed_callback(&self) -> Option<crate::logging::LogCallback> {
        self.log_callback.as_ref().map(|callback| {
            let callback = Arc::clone(callback);
            Box::new(move |line: &str| callback(line)) as crate::logging::LogCallback
        })
    }

    fn release_logger(&mut self, job_id: &str) {
        if let Some(logger) = self.loggers.remove(job_id) {
            logger.close();
        }
    }

    fn release_all_loggers(&mut self) {
        for (_, logger) in self.loggers.drain() {
            logger.close();
        }
    }
}

impl StepExecutor for Dispatcher {
    fn execute_step(&mut self, job_id: &str, step_index: usize, args: &StepArgs) -> bool {
        match self.run_step(job_id, step_index, args) {
            Ok(outcome) => outcome.is_success(),
            Err(e) => {
                self.logger_for(job_id)
                    .error(&format!("Step {} did not start: {}", step_index + 1, e));
                false
            }
        }
    }
}

/// Suggested id for `prefix`, suffixed with a counter when taken.
fn unused_job_id(store: &JobStore, prefix: &str) -> String {
    let base = suggest_job_id(prefix);
    let mut job_id = base.clone();
    let mut counter = 2;
    while store.contains(&job_id) {
        job_id = format!("{}-{}", base, counter);
        counter += 1;
    }
    job_id
}
