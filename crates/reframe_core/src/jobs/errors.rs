//! Error types for job persistence and lifecycle transitions.

use std::io;

use thiserror::Error;

use super::types::JobStatus;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Job '{0}' already exists")]
    AlreadyExists(String),

    #[error("Invalid job id '{0}'")]
    InvalidId(String),

    /// The transition is not legal from the job's current status.
    #[error("Cannot {operation} job '{job_id}' while it is {status}")]
    InvalidState {
        job_id: String,
        status: JobStatus,
        operation: String,
    },

    #[error("Job '{job_id}' has no step at index {index}")]
    StepOutOfRange { job_id: String, index: isize },

    #[error("Job '{0}' has no steps")]
    NoSteps(String),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to serialize job '{job_id}': {source}")]
    Serialize {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl JobError {
    pub fn invalid_state(
        job_id: impl Into<String>,
        status: JobStatus,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            job_id: job_id.into(),
            status,
            operation: operation.into(),
        }
    }

    pub fn step_out_of_range(job_id: impl Into<String>, index: isize) -> Self {
        Self::StepOutOfRange {
            job_id: job_id.into(),
            index,
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, source: globset::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Whether the error is about an unknown job.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error is an illegal transition.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::NoSteps(_))
    }
}

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;
