//! Settings file handling.
//!
//! The settings file holds run defaults (`[processing]`, `[output]`),
//! storage locations (`[paths]`), job log behaviour (`[logging]`) and the
//! batch policy (`[jobs]`). Each table can be rewritten on its own.
//!
//! ```no_run
//! use reframe_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create()?;
//! config.ensure_dirs_exist()?;
//!
//! config.settings_mut().jobs.halt_on_error = true;
//! config.update_section(ConfigSection::Jobs)?;
//! # Ok::<(), reframe_core::config::ConfigError>(())
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, JobSettings, LoggingSettings, OutputSettings, PathSettings,
    ProcessingSettings, Settings,
};
