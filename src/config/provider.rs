//! Key/value configuration access
//!
//! Components read configuration through [`ConfigProvider`] using dotted
//! keys such as `backup.retention_count`. Two providers ship with the crate:
//! [`SettingsProvider`] backed by the settings file, and
//! [`MapConfigProvider`] backed by a flat map.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde_json::Value;

use super::paths::KeeperPaths;
use super::settings::Settings;
use crate::error::{KeeperError, KeeperResult};

/// Configuration keys understood by the backup pipeline
pub mod keys {
    pub const BACKUP_ENABLED: &str = "backup.enabled";
    pub const AUTO_SCHEDULING_ENABLED: &str = "backup.automatic_scheduling_enabled";
    pub const STRATEGY: &str = "backup.strategy";
    pub const FREQUENCY_HOURS: &str = "backup.frequency_hours";
    pub const TARGET_DIRECTORY: &str = "backup.target_directory";
    pub const RETENTION_COUNT: &str = "backup.retention_count";
    pub const SOURCE_DB_PATH: &str = "backup.source_db_path";
    pub const SYNC_ENABLED: &str = "sync.enabled";
}

/// Source of configuration values
pub trait ConfigProvider: Send + Sync {
    /// Look up a dotted key, returning `None` when it is not set
    fn get(&self, key: &str) -> Option<Value>;
}

/// Typed lookups with defaults, available on every provider
pub trait ConfigProviderExt: ConfigProvider {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    fn get_path(&self, key: &str, default: PathBuf) -> PathBuf {
        self.get(key)
            .and_then(|v| v.as_str().map(PathBuf::from))
            .unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Provider over the persisted [`Settings`] document
///
/// Keys resolve by walking the serialized JSON, so `backup.enabled` reads
/// `settings.backup.enabled`. [`reload`](Self::reload) re-reads the file.
pub struct SettingsProvider {
    paths: KeeperPaths,
    settings: RwLock<Value>,
}

impl SettingsProvider {
    /// Load settings from `paths`, falling back to defaults
    pub fn load(paths: KeeperPaths) -> KeeperResult<Self> {
        let settings = Settings::load_or_create(&paths)?;
        Ok(Self {
            paths,
            settings: RwLock::new(serde_json::to_value(&settings)?),
        })
    }

    /// Wrap an in-memory settings value
    pub fn from_settings(paths: KeeperPaths, settings: &Settings) -> KeeperResult<Self> {
        Ok(Self {
            paths,
            settings: RwLock::new(serde_json::to_value(settings)?),
        })
    }

    /// Re-read the settings file
    pub fn reload(&self) -> KeeperResult<()> {
        let settings = Settings::load_or_create(&self.paths)?;
        let value = serde_json::to_value(&settings)?;
        let mut guard = self
            .settings
            .write()
            .map_err(|_| KeeperError::Config("settings lock poisoned".into()))?;
        *guard = value;
        Ok(())
    }
}

impl ConfigProvider for SettingsProvider {
    fn get(&self, key: &str) -> Option<Value> {
        let guard = self.settings.read().ok()?;
        let mut node = &*guard;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        Some(node.clone())
    }
}

/// Flat key/value provider
#[derive(Debug, Default)]
pub struct MapConfigProvider {
    values: RwLock<HashMap<String, Value>>,
}

impl MapConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set or replace a value
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.into());
        }
    }
}

impl ConfigProvider for MapConfigProvider {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().ok()?.get(key).cloned()
    }
}
