//! Settings file ownership.
//!
//! The settings file is TOML with one table per [`ConfigSection`]. Writes
//! go through a sibling `.tmp` file and a rename. Relative paths in the
//! `[paths]` table resolve against the settings file's directory.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Table};

use super::settings::{ConfigSection, Settings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Settings file is not valid TOML: {0}")]
    Document(#[from] toml_edit::TomlError),

    #[error("Settings file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

const SETTINGS_HEADER: &str =
    "# reframe settings\n# Generated file; section updates keep other tables as-is.\n";

pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Manager for `config_path` holding default settings until loaded.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory edits; persist with [`save`](Self::save) or
    /// [`update_section`](Self::update_section).
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn load(&mut self) -> ConfigResult<()> {
        let content = match fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(self.config_path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        self.settings = toml::from_str(&content)?;
        Ok(())
    }

    /// Load the settings file, creating it with defaults when absent.
    ///
    /// A file missing a section or carrying unknown tables is rewritten
    /// with the loaded values.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        match self.load() {
            Ok(()) => {
                let document: DocumentMut = fs::read_to_string(&self.config_path)?.parse()?;
                if needs_rewrite(&document) {
                    tracing::debug!("Rewriting settings at {}", self.config_path.display());
                    self.save()?;
                }
                Ok(())
            }
            Err(ConfigError::NotFound(_)) => {
                self.settings = Settings::default();
                self.save()?;
                tracing::info!("Wrote default settings to {}", self.config_path.display());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.resolve(&self.settings.paths.jobs_path)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.resolve(&self.settings.paths.temp_root)
    }

    pub fn logs_folder(&self) -> PathBuf {
        self.resolve(&self.settings.paths.logs_folder)
    }

    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        for dir in [self.jobs_path(), self.temp_root(), self.logs_folder()] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Write every section, each under a comment header.
    pub fn save(&self) -> ConfigResult<()> {
        let mut document = DocumentMut::new();

        for section in ConfigSection::ALL {
            let mut table = self.section_table(section)?;
            table
                .decor_mut()
                .set_prefix(format!("\n# {}\n", section.comment()));
            document.insert(section.table_name(), Item::Table(table));
        }

        let content = format!("{}{}", SETTINGS_HEADER, document);
        self.write_atomically(&content)?;
        Ok(())
    }

    /// Replace a single table in the file on disk, leaving the rest of the
    /// file (including comments) untouched.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let mut document = match fs::read_to_string(&self.config_path) {
            Ok(content) => content.parse::<DocumentMut>()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => DocumentMut::new(),
            Err(e) => return Err(e.into()),
        };

        let mut table = self.section_table(section)?;
        if let Some(existing) = document.get(section.table_name()).and_then(Item::as_table) {
            *table.decor_mut() = existing.decor().clone();
        }
        document.insert(section.table_name(), Item::Table(table));

        self.write_atomically(&document.to_string())?;
        Ok(())
    }

    fn section_table(&self, section: ConfigSection) -> ConfigResult<Table> {
        let s = &self.settings;
        match section {
            ConfigSection::Paths => to_table(&s.paths),
            ConfigSection::Logging => to_table(&s.logging),
            ConfigSection::Processing => to_table(&s.processing),
            ConfigSection::Output => to_table(&s.output),
            ConfigSection::Jobs => to_table(&s.jobs),
        }
    }

    fn resolve(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        match self.config_path.parent() {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn write_atomically(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.config_path)
    }
}

fn to_table<T: Serialize>(value: &T) -> ConfigResult<Table> {
    let document: DocumentMut = toml::to_string(value)?.parse()?;
    Ok(document.as_table().clone())
}

fn needs_rewrite(document: &DocumentMut) -> bool {
    let known = |key: &str| ConfigSection::ALL.iter().any(|s| s.table_name() == key);
    document.iter().any(|(key, _)| !known(key))
        || ConfigSection::ALL
            .iter()
            .any(|s| !document.contains_key(s.table_name()))
}
