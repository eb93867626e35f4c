//! Append-only backup metadata log
//!
//! Each record is written as a single JSON line and flushed immediately.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{KeeperError, KeeperResult};

use super::record::{BackupRecord, LastBackupInfo};
use super::MetadataStore;

/// Stores backup records in a line-delimited JSON file (JSONL)
pub struct JsonlMetadataStore {
    /// Path to the metadata log file
    log_path: PathBuf,
    /// Serializes appends from concurrent backup tasks
    write_lock: Mutex<()>,
}

impl JsonlMetadataStore {
    /// Create a store that writes to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append a record as a JSON line
    pub fn append(&self, record: &BackupRecord) -> KeeperResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| KeeperError::MetadataRecordFailed("metadata log lock poisoned".into()))?;

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KeeperError::Io(format!("Failed to create metadata directory: {}", e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| KeeperError::Io(format!("Failed to open metadata log: {}", e)))?;

        let json = serde_json::to_string(record)
            .map_err(|e| KeeperError::Json(format!("Failed to serialize backup record: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| KeeperError::Io(format!("Failed to write backup record: {}", e)))?;

        file.flush()
            .map_err(|e| KeeperError::Io(format!("Failed to flush metadata log: {}", e)))?;

        Ok(())
    }

    /// Read all records from the log file
    ///
    /// Returns records in the order they were written (oldest first).
    pub fn read_all(&self) -> KeeperResult<Vec<BackupRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| KeeperError::Io(format!("Failed to open metadata log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                KeeperError::Io(format!("Failed to read metadata log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: BackupRecord = serde_json::from_str(&line).map_err(|e| {
                KeeperError::Json(format!(
                    "Failed to parse backup record at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            records.push(record);
        }

        Ok(records)
    }

    /// Read the most recent N records from the log
    pub fn read_recent(&self, count: usize) -> KeeperResult<Vec<BackupRecord>> {
        let all_records = self.read_all()?;
        let start = all_records.len().saturating_sub(count);
        Ok(all_records[start..].to_vec())
    }
}

impl MetadataStore for JsonlMetadataStore {
    fn record_backup(&self, record: BackupRecord) -> KeeperResult<()> {
        self.append(&record)
            .map_err(|e| KeeperError::MetadataRecordFailed(e.to_string()))
    }

    fn last_backup_info(&self) -> KeeperResult<Option<LastBackupInfo>> {
        let records = self.read_all()?;
        Ok(records
            .iter()
            .filter(|r| r.is_success())
            .max_by_key(|r| r.timestamp)
            .map(LastBackupInfo::from))
    }
}
