//! User settings for keeper
//!
//! Persists the backup and sync sections of the configuration as a JSON
//! document. Every field carries a serde default so partial files load.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::KeeperPaths;
use crate::error::KeeperError;

/// Backup section of the settings file
///
/// Field names match the `backup.*` configuration keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Master switch for all backups
    #[serde(default)]
    pub enabled: bool,

    /// Whether the background scheduler should run
    #[serde(default)]
    pub automatic_scheduling_enabled: bool,

    /// Backup strategy name
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Minimum hours between scheduled backups
    #[serde(default = "default_frequency_hours")]
    pub frequency_hours: f64,

    /// Directory backups are written to
    #[serde(default = "default_target_directory")]
    pub target_directory: PathBuf,

    /// Number of backups to keep (0 keeps all)
    #[serde(default = "default_retention_count")]
    pub retention_count: u32,

    /// File that gets backed up
    #[serde(default = "default_source_db_path")]
    pub source_db_path: PathBuf,
}

/// Sync section of the settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub enabled: bool,
}

pub(crate) fn default_strategy() -> String {
    "file_copy".to_string()
}

pub(crate) fn default_frequency_hours() -> f64 {
    24.0
}

pub(crate) fn default_target_directory() -> PathBuf {
    PathBuf::from("./backups")
}

pub(crate) fn default_retention_count() -> u32 {
    5
}

pub(crate) fn default_source_db_path() -> PathBuf {
    PathBuf::from("./data/app.db")
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            automatic_scheduling_enabled: false,
            strategy: default_strategy(),
            frequency_hours: default_frequency_hours(),
            target_directory: default_target_directory(),
            retention_count: default_retention_count(),
            source_db_path: default_source_db_path(),
        }
    }
}

/// User settings for keeper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Backup configuration
    #[serde(default)]
    pub backup: BackupSettings,

    /// Sync configuration (placeholder feature)
    #[serde(default)]
    pub sync: SyncSettings,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup: BackupSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Settings {
    /// Default settings with backup locations rooted at `paths`
    pub fn for_paths(paths: &KeeperPaths) -> Self {
        let mut settings = Self::default();
        settings.backup.target_directory = paths.backup_dir();
        settings.backup.source_db_path = paths.default_source();
        settings
    }

    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &KeeperPaths) -> Result<Self, KeeperError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| KeeperError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents)
                .map_err(|e| KeeperError::Config(format!("Failed to parse settings file: {}", e)))?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::for_paths(paths))
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &KeeperPaths) -> Result<(), KeeperError> {
        paths.ensure_directories()?;

        let settings_path = paths.settings_file();
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| KeeperError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(&settings_path, contents)
            .map_err(|e| KeeperError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
