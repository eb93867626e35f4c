//! Configuration module for keeper
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings file persistence
//! - Key/value access for the backup pipeline
//! - The immutable backup configuration snapshot

pub mod backup;
pub mod paths;
pub mod provider;
pub mod settings;

pub use backup::{BackupConfig, BackupStrategy};
pub use paths::KeeperPaths;
pub use provider::{ConfigProvider, ConfigProviderExt, MapConfigProvider, SettingsProvider};
pub use settings::Settings;
