//! Custom error types for keeper
//!
//! This module defines the error hierarchy for the backup pipeline using
//! thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for keeper operations
#[derive(Error, Debug)]
pub enum KeeperError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// The file to back up does not exist
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The backup directory could not be created
    #[error("Failed to create backup directory {}: {reason}", path.display())]
    DirectoryCreateFailed { path: PathBuf, reason: String },

    /// Copying the source file into the backup directory failed
    #[error("Backup copy failed: {0}")]
    CopyFailed(String),

    /// The metadata store rejected a backup record
    #[error("Failed to record backup metadata: {0}")]
    MetadataRecordFailed(String),

    /// The configured strategy has no implementation
    #[error("Backup strategy '{0}' not implemented")]
    StrategyNotImplemented(String),

    /// A stored timestamp could not be parsed
    #[error("Invalid timestamp format: {0}")]
    InvalidTimestampFormat(String),

    /// Another backup is still running
    #[error("A backup is already in progress")]
    BackupInProgress,

    /// No async runtime available to run background work
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl KeeperError {
    /// Check if this error came from a pre-flight check on the filesystem
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_) | Self::DirectoryCreateFailed { .. }
        )
    }
}

impl From<std::io::Error> for KeeperError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for keeper operations
pub type KeeperResult<T> = Result<T, KeeperError>;
