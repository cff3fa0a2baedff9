use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LoggingSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

/// How a [`JobLogger`](super::JobLogger) filters and stamps lines.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Write stage progress only when it crosses a `progress_step` boundary.
    pub compact: bool,
    pub progress_step: u32,
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_settings(&LoggingSettings::default())
    }
}

impl LogConfig {
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level,
            compact: settings.compact,
            progress_step: settings.progress_step.max(1),
            show_timestamps: true,
        }
    }
}

/// Receives each job log line after formatting.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Visual treatment of a job log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    /// Start of a pipeline phase, e.g. `>> Extracting`.
    Phase,
    /// A processor's part of a phase, e.g. `-- face_swapper`.
    Section,
    Success,
    Warning,
    Error,
}

impl LineStyle {
    pub fn decorate(&self, message: &str) -> String {
        let marker = match self {
            LineStyle::Plain => return message.to_string(),
            LineStyle::Phase => ">>",
            LineStyle::Section => "--",
            LineStyle::Success => "OK:",
            LineStyle::Warning => "WARN:",
            LineStyle::Error => "ERROR:",
        };
        format!("{} {}", marker, message)
    }
}
