//! Backup record types
//!
//! A [`BackupRecord`] describes one backup attempt, successful or not.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a backup attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Success,
    Failed,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a single backup attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Backup file name, unique per attempt
    pub backup_id: String,
    /// When the attempt started
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    /// Size of the written backup (0 on failure)
    pub size_bytes: u64,
    pub status: BackupStatus,
    /// Event that caused the attempt (`manual_trigger`, `auto_schedule`, ...)
    pub trigger_reason: String,
    /// Destination path of the backup file
    pub path: String,
    pub duration_seconds: f64,
    /// Human-readable summary
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl BackupRecord {
    pub fn is_success(&self) -> bool {
        self.status == BackupStatus::Success
    }

    /// The record timestamp formatted as `YYYY-MM-DDTHH:MM:SSZ`
    pub fn timestamp_iso(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// The most recent successful backup, as reported by a metadata store
///
/// The timestamp is kept as the raw stored string; it is parsed by the
/// caller, which decides how to treat malformed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBackupInfo {
    pub status: BackupStatus,
    pub timestamp: String,
}

impl From<&BackupRecord> for LastBackupInfo {
    fn from(record: &BackupRecord) -> Self {
        Self {
            status: record.status,
            timestamp: record.timestamp_iso(),
        }
    }
}

/// Format a UTC timestamp the way records store it
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp, accepting a trailing `Z` or an explicit offset
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
