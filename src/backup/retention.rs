//! Retention policy for backup directories
//!
//! Keeps the newest `retention_count` backups of a source file and deletes
//! the rest. A count of zero keeps everything.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::pattern::BackupPattern;

/// Files removed (or not) by one retention pass
#[derive(Debug, Default)]
pub struct RetentionReport {
    /// Backups that were deleted
    pub deleted: Vec<PathBuf>,
    /// Backups that should have been deleted but could not be
    pub failed: Vec<(PathBuf, String)>,
}

impl RetentionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A backup file considered by the retention pass
#[derive(Debug, Clone)]
pub struct BackupFile {
    pub path: PathBuf,
    pub file_name: String,
    pub modified: SystemTime,
    pub size_bytes: u64,
}

/// Deletes all but the newest backups in a directory
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    retention_count: u32,
    pattern: BackupPattern,
}

impl RetentionPolicy {
    pub fn new(retention_count: u32, pattern: BackupPattern) -> Self {
        Self {
            retention_count,
            pattern,
        }
    }

    pub fn retention_count(&self) -> u32 {
        self.retention_count
    }

    /// List backups in `dir`, oldest first
    ///
    /// Ordering is by modification time with the file name as tie-breaker;
    /// names embed the backup timestamp, so copies that share the source's
    /// preserved mtime still sort chronologically.
    pub fn list(&self, dir: &Path) -> Vec<BackupFile> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<BackupFile> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().to_string();
                if !self.pattern.matches(&file_name) {
                    return None;
                }
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }
                Some(BackupFile {
                    path: entry.path(),
                    file_name,
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    size_bytes: metadata.len(),
                })
            })
            .collect();

        files.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        files
    }

    /// Backups that a retention pass would delete, oldest first
    ///
    /// `protect` is never a candidate and counts as one of the kept backups.
    pub fn candidates(&self, dir: &Path, protect: Option<&Path>) -> Vec<BackupFile> {
        if self.retention_count == 0 {
            return Vec::new();
        }

        let mut files = self.list(dir);
        let mut keep = self.retention_count as usize;
        if let Some(protected) = protect {
            let before = files.len();
            files.retain(|f| f.path != protected);
            if files.len() < before {
                keep = keep.saturating_sub(1);
            }
        }

        let excess = files.len().saturating_sub(keep);
        files.truncate(excess);
        files
    }

    /// Delete excess backups in `dir`
    ///
    /// Deletion is best effort: a file that cannot be removed is logged and
    /// recorded in the report, and the pass continues with the next one.
    pub fn apply(&self, dir: &Path, protect: Option<&Path>) -> RetentionReport {
        if self.retention_count == 0 || !dir.is_dir() {
            return RetentionReport::default();
        }

        debug!(
            target: "keeper::retention",
            dir = %dir.display(),
            retain = self.retention_count,
            "cleaning up old backups"
        );

        remove_all(self.candidates(dir, protect))
    }
}

/// Delete every file in `files`, continuing past failures
fn remove_all(files: Vec<BackupFile>) -> RetentionReport {
    let mut report = RetentionReport::default();

    for file in files {
        match fs::remove_file(&file.path) {
            Ok(()) => {
                info!(target: "keeper::retention", path = %file.path.display(), "deleted old backup");
                report.deleted.push(file.path);
            }
            Err(e) => {
                warn!(
                    target: "keeper::retention",
                    path = %file.path.display(),
                    error = %e,
                    "failed to delete old backup"
                );
                report.failed.push((file.path, e.to_string()));
            }
        }
    }

    report
}
