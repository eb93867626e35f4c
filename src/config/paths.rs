//! Path management for keeper
//!
//! Provides XDG-compliant path resolution for settings, data, backups and
//! the backup metadata log.
//!
//! ## Path Resolution Order
//!
//! 1. `KEEPER_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/keeper` or `~/.config/keeper`
//! 3. Windows: `%APPDATA%\keeper`

use std::path::PathBuf;

use crate::error::KeeperError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "KEEPER_DATA_DIR";

/// Manages all paths used by keeper
#[derive(Debug, Clone)]
pub struct KeeperPaths {
    /// Base directory for all keeper data
    base_dir: PathBuf,
}

impl KeeperPaths {
    /// Create a new KeeperPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, KeeperError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create KeeperPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/keeper/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory (~/.config/keeper/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the default backup directory (~/.config/keeper/backups/)
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the backup metadata log
    pub fn metadata_log(&self) -> PathBuf {
        self.base_dir.join("backups.jsonl")
    }

    /// Get the default file to back up
    pub fn default_source(&self) -> PathBuf {
        self.data_dir().join("app.db")
    }

    /// Ensure the base and data directories exist
    ///
    /// The backup directory is created lazily by each backup attempt, since
    /// the configured target may live elsewhere.
    pub fn ensure_directories(&self) -> Result<(), KeeperError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| KeeperError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| KeeperError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Check if keeper has been initialized (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, KeeperError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("keeper"));
    }
    let home = std::env::var("HOME")
        .map_err(|_| KeeperError::Config("HOME environment variable not set".into()))?;
    Ok(PathBuf::from(home).join(".config").join("keeper"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, KeeperError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| KeeperError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("keeper"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = KeeperPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
        assert_eq!(paths.metadata_log(), temp_dir.path().join("backups.jsonl"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = KeeperPaths::with_base_dir(temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();

        assert!(paths.data_dir().exists());
        assert!(!paths.is_initialized());
    }

    #[test]
    fn test_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = KeeperPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(
            paths.default_source(),
            temp_dir.path().join("data").join("app.db")
        );
    }
}
