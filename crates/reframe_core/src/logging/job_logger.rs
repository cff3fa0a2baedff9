//! Per-job log output.
//!
//! One logger serves every step of a job. Lines go to `<dir>/<job>.log`
//! (appended, so a retry continues the same file), to an optional
//! observer callback, and to `tracing` tagged with the job id.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LineStyle, LogCallback, LogConfig, LogLevel};

#[derive(Default)]
struct Sinks {
    file: Option<BufWriter<File>>,
    callback: Option<LogCallback>,
    /// Progress bucket last written in the current phase.
    progress_bucket: Option<u32>,
}

pub struct JobLogger {
    job_name: String,
    log_path: Option<PathBuf>,
    config: LogConfig,
    sinks: Mutex<Sinks>,
}

impl JobLogger {
    /// Logger appending to `<log_dir>/<job_name>.log`.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> io::Result<Self> {
        let job_name = job_name.into();
        fs::create_dir_all(log_dir.as_ref())?;

        let log_path = log_dir.as_ref().join(log_file_name(&job_name));
        let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

        Ok(Self {
            job_name,
            log_path: Some(log_path),
            config,
            sinks: Mutex::new(Sinks {
                file: Some(BufWriter::new(file)),
                callback,
                progress_bucket: None,
            }),
        })
    }

    /// Logger without a file.
    pub fn detached(job_name: impl Into<String>, config: LogConfig) -> Self {
        Self {
            job_name: job_name.into(),
            log_path: None,
            config,
            sinks: Mutex::new(Sinks::default()),
        }
    }

    pub fn set_callback(&self, callback: Option<LogCallback>) {
        self.sinks.lock().callback = callback;
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.write(level, LineStyle::Plain, message);
    }

    pub fn info(&self, message: &str) {
        self.write(LogLevel::Info, LineStyle::Plain, message);
    }

    pub fn debug(&self, message: &str) {
        self.write(LogLevel::Debug, LineStyle::Plain, message);
    }

    pub fn warn(&self, message: &str) {
        self.write(LogLevel::Warn, LineStyle::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.write(LogLevel::Error, LineStyle::Error, message);
    }

    /// Start a phase; progress filtering starts over.
    pub fn phase(&self, name: &str) {
        self.sinks.lock().progress_bucket = None;
        self.write(LogLevel::Info, LineStyle::Phase, name);
    }

    pub fn section(&self, name: &str) {
        self.write(LogLevel::Info, LineStyle::Section, name);
    }

    pub fn success(&self, message: &str) {
        self.write(LogLevel::Info, LineStyle::Success, message);
    }

    /// Report stage progress. In compact mode only the first value in each
    /// `progress_step` bucket is written. Returns whether a line was written.
    pub fn progress(&self, stage: &str, percent: u32) -> bool {
        let percent = percent.min(100);
        let bucket = percent / self.config.progress_step.max(1);
        {
            let mut sinks = self.sinks.lock();
            if self.config.compact && sinks.progress_bucket == Some(bucket) {
                return false;
            }
            sinks.progress_bucket = Some(bucket);
        }
        self.info(&format!("{}: {}%", stage, percent));
        true
    }

    pub fn flush(&self) {
        if let Some(file) = self.sinks.lock().file.as_mut() {
            let _ = file.flush();
        }
    }

    /// Flush and release the log file. The callback keeps receiving lines.
    pub fn close(&self) {
        if let Some(mut file) = self.sinks.lock().file.take() {
            let _ = file.flush();
        }
    }

    fn write(&self, level: LogLevel, style: LineStyle, message: &str) {
        if level < self.config.level {
            return;
        }
        let line = style.decorate(message);

        match level {
            LogLevel::Trace => tracing::trace!(job = %self.job_name, "{}", line),
            LogLevel::Debug => tracing::debug!(job = %self.job_name, "{}", line),
            LogLevel::Info => tracing::info!(job = %self.job_name, "{}", line),
            LogLevel::Warn => tracing::warn!(job = %self.job_name, "{}", line),
            LogLevel::Error => tracing::error!(job = %self.job_name, "{}", line),
        }

        let line = if self.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), line)
        } else {
            line
        };

        let mut sinks = self.sinks.lock();
        if let Some(file) = sinks.file.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
        if let Some(callback) = sinks.callback.as_ref() {
            callback(&line);
        }
    }
}

impl std::fmt::Debug for JobLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLogger")
            .field("job_name", &self.job_name)
            .field("log_path", &self.log_path)
            .finish_non_exhaustive()
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// `<job>.log` with path separators and reserved characters replaced.
fn log_file_name(job_name: &str) -> String {
    let stem: String = job_name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{}.log", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn quiet() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    #[test]
    fn reopening_appends_to_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        JobLogger::new("job-1", dir.path(), quiet(), None)
            .unwrap()
            .info("first run");

        let logger = JobLogger::new("job-1", dir.path(), quiet(), None).unwrap();
        logger.info("retry");
        logger.close();

        let content = fs::read_to_string(dir.path().join("job-1.log")).unwrap();
        assert_eq!(content, "first run\nretry\n");
    }

    #[test]
    fn callback_sees_lines_at_or_above_level() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger = JobLogger::detached("job", quiet());
        logger.set_callback(Some(Box::new(move |line: &str| sink.lock().push(line.to_string()))));

        logger.phase("Extracting");
        logger.debug("hidden at info level");
        logger.warn("Restoring audio skipped");

        assert_eq!(
            *lines.lock(),
            vec![">> Extracting".to_string(), "WARN: Restoring audio skipped".to_string()]
        );
        assert!(logger.log_path().is_none());
    }

    #[test]
    fn compact_progress_writes_once_per_bucket() {
        let logger = JobLogger::detached("job", quiet());

        assert!(logger.progress("Extracting", 0));
        assert!(!logger.progress("Extracting", 5));
        assert!(!logger.progress("Extracting", 15));
        assert!(logger.progress("Extracting", 20));
        assert!(!logger.progress("Extracting", 25));
        assert!(logger.progress("Extracting", 100));

        logger.phase("Merging");
        assert!(logger.progress("Merging", 5));
    }

    #[test]
    fn log_file_names_are_safe() {
        assert_eq!(log_file_name("headless-2024"), "headless-2024.log");
        assert_eq!(log_file_name("a/b:c"), "a_b_c.log");
    }
}
