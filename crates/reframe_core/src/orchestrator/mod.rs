//! Pipeline orchestration for a single job step.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher (StepExecutor)
//!     ├── RunContext        built from the step snapshot
//!     ├── ProcessorRegistry name -> processor factory
//!     └── PipelineController
//!             ├── pre-process hooks
//!             ├── reference face priming (ReferenceFaceCache)
//!             ├── image: copy -> processors -> finalize
//!             └── video: extract -> processors -> merge -> audio
//! ```
//!
//! # Example
//!
//! ```ignore
//! use reframe_core::config::ConfigManager;
//! use reframe_core::jobs::{JobStore, StepArgs};
//! use reframe_core::orchestrator::{BatchRequest, Dispatcher, ProcessorRegistry};
//!
//! let mut config = ConfigManager::new("settings.toml");
//! config.load_or_create()?;
//!
//! let registry = ProcessorRegistry::new().with("face_swapper", || Box::new(FaceSwapper::new()));
//! let mut dispatcher = Dispatcher::with_defaults(&config, registry);
//! let mut store = JobStore::open(config.jobs_path())?;
//!
//! let args = StepArgs::new()
//!     .with("target_path", "clip.mp4")
//!     .with("output_path", "out/");
//! dispatcher.run_headless(&mut store, args)?;
//!
//! let batch = BatchRequest::new("clips/*.mp4", "out/clip-{index}.mp4")
//!     .with_source_pattern("faces/*.jpg");
//! dispatcher.run_batch(&mut store, &batch)?;
//! ```

mod batch;
mod context;
mod controller;
mod dispatcher;
mod errors;
mod outcome;
mod processor;
mod reference_faces;

pub use batch::{resolve_file_pattern, BatchRequest};
pub use context::RunContext;
pub use controller::PipelineController;
pub use dispatcher::{Dispatcher, SharedLogCallback};
pub use errors::{StepError, StepResult};
pub use outcome::{ExitCode, ProcessOutcome, RunReport};
pub use processor::{Processor, ProcessorFactory, ProcessorRegistry};
pub use reference_faces::{ReferenceFaceCache, ORIGIN_KEY};
