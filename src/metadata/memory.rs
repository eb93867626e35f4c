//! In-process metadata store

use std::sync::Mutex;

use crate::error::{KeeperError, KeeperResult};

use super::record::{BackupRecord, LastBackupInfo};
use super::MetadataStore;

/// Keeps backup records in memory
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Mutex<Vec<BackupRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, oldest first
    pub fn records(&self) -> Vec<BackupRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn record_backup(&self, record: BackupRecord) -> KeeperResult<()> {
        self.records
            .lock()
            .map_err(|_| KeeperError::MetadataRecordFailed("record list lock poisoned".into()))?
            .push(record);
        Ok(())
    }

    fn last_backup_info(&self) -> KeeperResult<Option<LastBackupInfo>> {
        let records = self
            .records
            .lock()
            .map_err(|_| KeeperError::Io("record list lock poisoned".into()))?;
        Ok(records
            .iter()
            .filter(|r| r.is_success())
            .max_by_key(|r| r.timestamp)
            .map(LastBackupInfo::from))
    }
}
