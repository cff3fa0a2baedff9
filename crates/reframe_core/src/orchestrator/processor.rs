//! Processor trait and name-based registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::context::RunContext;
use super::errors::{StepError, StepResult};
use super::reference_faces::ReferenceFaceCache;
use crate::models::{Face, ProcessMode, VisionFrame};

/// A participant in the pipeline's processor chain.
///
/// The controller calls, in order:
///
/// 1. `pre_process` - may refuse the run
/// 2. `process_image` or `process_video` - transform the workspace media
/// 3. `post_process` - release per-run resources
///
/// `pre_check` is called by the dispatcher before a step starts.
///
/// # Example
///
/// ```ignore
/// struct Grayscale;
///
/// impl Processor for Grayscale {
///     fn name(&self) -> &str { "grayscale" }
///
///     fn process_image(&mut self, ctx: &RunContext, _faces: &ReferenceFaceCache,
///                      input: &Path, output: &Path) {
///         // read input, convert, write output
///     }
///
///     fn process_video(&mut self, ctx: &RunContext, faces: &ReferenceFaceCache,
///                      frames: &[PathBuf]) {
///         for frame in frames {
///             self.process_image(ctx, faces, frame, frame);
///         }
///     }
/// }
/// ```
pub trait Processor {
    /// Registry name, also the key for this processor's reference faces.
    fn name(&self) -> &str;

    /// Whether the processor's models and resources are available.
    fn pre_check(&self) -> bool {
        true
    }

    fn pre_process(&mut self, _ctx: &RunContext, _mode: ProcessMode) -> bool {
        true
    }

    /// Transform `input` into `output`. The controller passes the same
    /// workspace file for both.
    fn process_image(
        &mut self,
        ctx: &RunContext,
        reference_faces: &ReferenceFaceCache,
        input: &Path,
        output: &Path,
    );

    /// Transform extracted frames in place.
    fn process_video(
        &mut self,
        ctx: &RunContext,
        reference_faces: &ReferenceFaceCache,
        frames: &[PathBuf],
    );

    fn post_process(&mut self) {}

    /// Frame as this processor would render it, used to find the
    /// processor's own reference face.
    fn reference_frame(
        &self,
        _source_face: &Face,
        _reference_face: &Face,
        _frame: &VisionFrame,
    ) -> Option<VisionFrame> {
        None
    }
}

/// Creates a fresh processor instance.
pub type ProcessorFactory = Box<dyn Fn() -> Box<dyn Processor> + Send + Sync>;

/// Maps processor names to factories.
#[derive(Default)]
pub struct ProcessorRegistry {
    factories: HashMap<String, ProcessorFactory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any existing one under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Processor> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Processor> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate processors in the given order.
    pub fn resolve(&self, names: &[String]) -> StepResult<Vec<Box<dyn Processor>>> {
        names
            .iter()
            .map(|name| {
                self.factories
                    .get(name)
                    .map(|factory| factory())
                    .ok_or_else(|| StepError::UnknownProcessor(name.clone()))
            })
            .collect()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
