//! Errors that stop a step before the pipeline starts.
//!
//! Once the pipeline runs, failures are reported as a
//! [`ProcessOutcome`](super::ProcessOutcome) instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StepError {
    /// The step snapshot could not be read as run options.
    #[error("Invalid step configuration: {0}")]
    InvalidArgs(String),

    /// A required option is absent from the snapshot.
    #[error("Step is missing required option '{0}'")]
    MissingArg(String),

    #[error("Unknown processor '{0}'")]
    UnknownProcessor(String),

    #[error("Pre-check failed for {0}")]
    PreCheckFailed(String),
}

impl StepError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    pub fn missing_arg(name: impl Into<String>) -> Self {
        Self::MissingArg(name.into())
    }

    pub fn pre_check_failed(what: impl Into<String>) -> Self {
        Self::PreCheckFailed(what.into())
    }
}

pub type StepResult<T> = Result<T, StepError>;
