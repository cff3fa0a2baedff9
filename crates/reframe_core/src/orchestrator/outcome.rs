//! Pipeline outcomes and process exit codes.

use std::fmt;
use std::time::Duration;

/// Result of one pipeline run. Every exit from the controller maps to one
/// of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    /// External tooling or file system failure.
    ToolingFailure,
    /// A processor refused to run.
    PreProcessFailed,
    /// Content analysis flagged the target.
    AnalysisRejected,
    /// A stop request was observed.
    Cancelled,
}

impl ProcessOutcome {
    pub fn code(&self) -> u8 {
        match self {
            ProcessOutcome::Success => 0,
            ProcessOutcome::ToolingFailure => 1,
            ProcessOutcome::PreProcessFailed => 2,
            ProcessOutcome::AnalysisRejected => 3,
            ProcessOutcome::Cancelled => 4,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ProcessOutcome::Success
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Success => write!(f, "success"),
            ProcessOutcome::ToolingFailure => write!(f, "tooling failure"),
            ProcessOutcome::PreProcessFailed => write!(f, "pre-process failed"),
            ProcessOutcome::AnalysisRejected => write!(f, "analysis rejected"),
            ProcessOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome plus wall-clock duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: ProcessOutcome,
    pub elapsed: Duration,
}

/// Exit codes for a command line front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
    /// Bad invocation or configuration.
    Usage = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<bool> for ExitCode {
    fn from(success: bool) -> Self {
        if success {
            ExitCode::Success
        } else {
            ExitCode::Failure
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
