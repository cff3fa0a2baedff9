//! Errors raised inside the ffmpeg adapter.
//!
//! The [`MediaToolkit`](super::MediaToolkit) boundary reports plain
//! booleans; these errors are logged and flattened there.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("Failed to probe {path}: {message}")]
    Probe { path: String, message: String },

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

impl MediaError {
    pub fn spawn(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    pub fn command_failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn probe(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
