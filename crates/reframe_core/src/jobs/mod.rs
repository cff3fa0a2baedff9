//! Job management.
//!
//! Jobs are named, ordered lists of steps. Each step captures the
//! configuration of one pipeline run. [`JobStore`] owns the records and
//! their lifecycle; [`JobRunner`] drives queued jobs through a
//! [`StepExecutor`].

mod errors;
mod list;
mod runner;
mod store;
mod types;

pub use errors::{JobError, JobResult};
pub use list::{JobList, JOB_LIST_HEADERS};
pub use runner::{JobRunner, StepExecutor};
pub use store::JobStore;
pub use types::{Job, JobStatus, Step, StepArgs, StepStatus, JOB_FORMAT_VERSION};

/// Suggest a job id of the form `<prefix>-YYYY-MM-DD-HH-MM-SS`.
pub fn suggest_job_id(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Local::now().format("%Y-%m-%d-%H-%M-%S"))
}
