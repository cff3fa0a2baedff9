//! Settings tables.
//!
//! Settings hold the defaults every step starts from. A step's own
//! configuration snapshot overrides the `processing` and `output`
//! sections when its `RunContext` is built.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::{FaceSelectorMode, FaceSelectorOrder, Resolution};

/// Everything in the settings file, one field per TOML table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Processor chain and face selection defaults.
    #[serde(default)]
    pub processing: ProcessingSettings,

    /// Output encoding defaults.
    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub jobs: JobSettings,
}

/// Identifies one TOML table in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Processing,
    Output,
    Jobs,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Processing,
        ConfigSection::Output,
        ConfigSection::Jobs,
    ];

    /// TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Processing => "processing",
            ConfigSection::Output => "output",
            ConfigSection::Jobs => "jobs",
        }
    }

    /// Comment written above the table when generating a fresh file.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Job store, temp workspace and log locations",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Processing => "Processor chain and face selection defaults",
            ConfigSection::Output => "Output encoding defaults",
            ConfigSection::Jobs => "Job runner policy",
        }
    }
}

/// Path configuration for jobs, temp workspaces and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder for persisted job files.
    #[serde(default = "default_jobs_path")]
    pub jobs_path: String,

    /// Root folder for per-target temp workspaces.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_jobs_path() -> String {
    ".jobs".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            jobs_path: default_jobs_path(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,

    /// Filter stage progress to `progress_step` intervals.
    #[serde(default = "default_true")]
    pub compact: bool,

    #[serde(default = "default_progress_step")]
    pub progress_step: u32,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: default_progress_step(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSettings {
    /// Processor names in chain order.
    #[serde(default)]
    pub processors: Vec<String>,

    /// Image format for extracted frames.
    #[serde(default = "default_temp_frame_format")]
    pub temp_frame_format: String,

    #[serde(default)]
    pub face_selector_mode: FaceSelectorMode,

    #[serde(default)]
    pub face_selector_order: FaceSelectorOrder,

    /// Which face (after sorting) becomes the reference.
    #[serde(default)]
    pub reference_face_position: usize,

    /// Video frame the reference face is read from.
    #[serde(default)]
    pub reference_frame_number: u32,
}

fn default_temp_frame_format() -> String {
    "png".to_string()
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            processors: Vec::new(),
            temp_frame_format: default_temp_frame_format(),
            face_selector_mode: FaceSelectorMode::default(),
            face_selector_order: FaceSelectorOrder::default(),
            reference_face_position: 0,
            reference_frame_number: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Requested image resolution; the source size when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_resolution: Option<Resolution>,

    /// Requested video resolution; the source size when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_resolution: Option<Resolution>,

    /// Requested video frame rate; the source rate when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_fps: Option<f64>,

    /// Audio volume in percent. Zero drops audio entirely.
    #[serde(default = "default_audio_volume")]
    pub audio_volume: u32,
}

fn default_audio_volume() -> u32 {
    100
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            image_resolution: None,
            video_resolution: None,
            video_fps: None,
            audio_volume: default_audio_volume(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSettings {
    /// Stop batch operations at the first failing job.
    #[serde(default)]
    pub halt_on_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let settings: Settings = toml::from_str("[output]\naudio_volume = 0\n").unwrap();
        assert_eq!(settings.output.audio_volume, 0);
        assert_eq!(settings.paths.jobs_path, ".jobs");
        assert_eq!(settings.processing.temp_frame_format, "png");
        assert!(settings.output.video_resolution.is_none());
    }

    #[test]
    fn resolution_round_trips_through_toml() {
        let mut settings = Settings::default();
        settings.output.video_resolution = Some(Resolution::new(1280, 720));
        let text = toml::to_string_pretty(&settings).unwrap();
        assert!(text.contains("video_resolution = \"1280x720\""));

        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.output.video_resolution, Some(Resolution::new(1280, 720)));
    }
}
