//! Backup configuration snapshot
//!
//! [`BackupConfig`] is read once from a [`ConfigProvider`] and then treated
//! as immutable; callers replace it wholesale on reload.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::provider::{keys, ConfigProvider, ConfigProviderExt};
use super::settings::{
    default_frequency_hours, default_retention_count, default_source_db_path,
    default_strategy, default_target_directory,
};
use crate::error::{KeeperError, KeeperResult};

/// Longest scheduling period (roughly 136 years)
pub const MAX_FREQUENCY: std::time::Duration = std::time::Duration::from_secs(u32::MAX as u64);

/// How a backup is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackupStrategy {
    /// Full copy of the source file
    FileCopy,
    /// A strategy name with no implementation
    Unsupported(String),
}

impl BackupStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            Self::FileCopy => "file_copy",
            Self::Unsupported(name) => name,
        }
    }
}

impl From<String> for BackupStrategy {
    fn from(name: String) -> Self {
        match name.as_str() {
            "file_copy" => Self::FileCopy,
            _ => Self::Unsupported(name),
        }
    }
}

impl From<BackupStrategy> for String {
    fn from(strategy: BackupStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl fmt::Display for BackupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of the backup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub enabled: bool,
    pub auto_scheduling_enabled: bool,
    pub strategy: BackupStrategy,
    pub frequency_hours: f64,
    pub target_directory: PathBuf,
    /// 0 disables cleanup
    pub retention_count: u32,
    pub source_path: PathBuf,
    pub sync_enabled: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_scheduling_enabled: false,
            strategy: BackupStrategy::FileCopy,
            frequency_hours: default_frequency_hours(),
            target_directory: default_target_directory(),
            retention_count: default_retention_count(),
            source_path: default_source_db_path(),
            sync_enabled: false,
        }
    }
}

impl BackupConfig {
    /// Read every backup key from `provider`, applying defaults for missing keys
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when automatic scheduling is enabled with a
    /// non-positive frequency.
    pub fn load(provider: &dyn ConfigProvider) -> KeeperResult<Self> {
        let config = Self {
            enabled: provider.get_bool(keys::BACKUP_ENABLED, false),
            auto_scheduling_enabled: provider.get_bool(keys::AUTO_SCHEDULING_ENABLED, false),
            strategy: BackupStrategy::from(
                provider.get_string(keys::STRATEGY, &default_strategy()),
            ),
            frequency_hours: provider.get_f64(keys::FREQUENCY_HOURS, default_frequency_hours()),
            target_directory: provider.get_path(keys::TARGET_DIRECTORY, default_target_directory()),
            retention_count: provider.get_u32(keys::RETENTION_COUNT, default_retention_count()),
            source_path: provider.get_path(keys::SOURCE_DB_PATH, default_source_db_path()),
            sync_enabled: provider.get_bool(keys::SYNC_ENABLED, false),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the snapshot invariants
    pub fn validate(&self) -> KeeperResult<()> {
        if self.auto_scheduling_enabled
            && !(self.frequency_hours.is_finite() && self.frequency_hours > 0.0)
        {
            return Err(KeeperError::Config(format!(
                "frequency_hours must be positive when automatic scheduling is enabled (got {})",
                self.frequency_hours
            )));
        }
        Ok(())
    }

    /// Whether the background scheduler may run
    pub fn scheduling_active(&self) -> bool {
        self.enabled && self.auto_scheduling_enabled
    }

    /// The scheduling period as a duration
    ///
    /// Capped at [`MAX_FREQUENCY`]; non-positive values give zero.
    pub fn frequency(&self) -> std::time::Duration {
        if !(self.frequency_hours.is_finite() && self.frequency_hours > 0.0) {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::try_from_secs_f64(self.frequency_hours * 3600.0)
            .map(|period| period.min(MAX_FREQUENCY))
            .unwrap_or(MAX_FREQUENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::provider::MapConfigProvider;

    #[test]
    fn test_load_defaults() {
        let provider = MapConfigProvider::new();
        let config = BackupConfig::load(&provider).unwrap();

        assert_eq!(config, BackupConfig::default());
        assert!(!config.scheduling_active());
    }

    #[test]
    fn test_load_values() {
        let provider = MapConfigProvider::new()
            .with(keys::BACKUP_ENABLED, true)
            .with(keys::AUTO_SCHEDULING_ENABLED, true)
            .with(keys::FREQUENCY_HOURS, 0.5)
            .with(keys::RETENTION_COUNT, 3)
            .with(keys::SOURCE_DB_PATH, "/data/app.db")
            .with(keys::TARGET_DIRECTORY, "/backups")
            .with(keys::STRATEGY, "db_dump");

        let config = BackupConfig::load(&provider).unwrap();
        assert!(config.scheduling_active());
        assert_eq!(config.retention_count, 3);
        assert_eq!(config.source_path, PathBuf::from("/data/app.db"));
        assert_eq!(config.strategy, BackupStrategy::Unsupported("db_dump".into()));
        assert_eq!(config.frequency(), std::time::Duration::from_secs(1800));
    }

    #[test]
    fn test_zero_frequency_rejected_with_scheduling() {
        let provider = MapConfigProvider::new()
            .with(keys::AUTO_SCHEDULING_ENABLED, true)
            .with(keys::FREQUENCY_HOURS, 0);

        let err = BackupConfig::load(&provider).unwrap_err();
        assert!(matches!(err, KeeperError::Config(_)));
    }

    #[test]
    fn test_zero_frequency_allowed_without_scheduling() {
        let provider = MapConfigProvider::new().with(keys::FREQUENCY_HOURS, 0);
        assert!(BackupConfig::load(&provider).is_ok());
    }

    #[test]
    fn test_huge_frequency_is_capped() {
        let provider = MapConfigProvider::new()
            .with(keys::BACKUP_ENABLED, true)
            .with(keys::AUTO_SCHEDULING_ENABLED, true)
            .with(keys::FREQUENCY_HOURS, 1e16);

        let config = BackupConfig::load(&provider).unwrap();
        assert_eq!(config.frequency(), MAX_FREQUENCY);

        let config = BackupConfig {
            frequency_hours: f64::MAX,
            ..config
        };
        assert_eq!(config.frequency(), MAX_FREQUENCY);
    }

    #[test]
    fn test_negative_frequency_is_zero() {
        let config = BackupConfig {
            frequency_hours: -1e300,
            ..BackupConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.frequency(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_strategy_serde() {
        let json = serde_json::to_string(&BackupStrategy::FileCopy).unwrap();
        assert_eq!(json, "\"file_copy\"");
        let parsed: BackupStrategy = serde_json::from_str("\"rsync\"").unwrap();
        assert_eq!(parsed.to_string(), "rsync");
    }
}
