//! Job logs and the global `tracing` subscriber.
//!
//! [`JobLogger`] writes the human-readable log of one job. Every line is
//! also emitted as a `tracing` event carrying a `job` field, so the global
//! subscriber installed by [`init_tracing`] or [`init_tracing_with_file`]
//! sees the same stream.
//!
//! ```no_run
//! use reframe_core::logging::{init_tracing, JobLogger, LogConfig, LogLevel};
//!
//! init_tracing(LogLevel::Info);
//!
//! let logger = JobLogger::new("job-1", ".logs", LogConfig::default(), None)?;
//! logger.phase("Extracting");
//! logger.progress("Extracting", 40);
//! logger.success("Processing succeeded in 12.30 seconds");
//! # Ok::<(), std::io::Error>(())
//! ```

mod job_logger;
mod types;

use std::path::Path;

pub use job_logger::JobLogger;
pub use tracing_appender::non_blocking::WorkerGuard;
pub use types::{LineStyle, LogCallback, LogConfig, LogLevel};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Name of the process-wide log file written by [`init_tracing_with_file`].
pub const PROCESS_LOG_FILE: &str = "reframe.log";

/// Install a stderr subscriber. `RUST_LOG` overrides `default_level`.
/// Later calls are no-ops.
pub fn init_tracing(default_level: LogLevel) {
    let _ = tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Install a subscriber writing to stderr and, through a background
/// writer, to `<log_dir>/reframe.log`.
///
/// Buffered lines are flushed when the returned guard drops.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    log_dir: impl AsRef<Path>,
) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir.as_ref())?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, PROCESS_LOG_FILE));

    let _ = tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init();

    Ok(guard)
}

#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}
