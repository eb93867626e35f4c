//! Backup metadata persistence
//!
//! Every backup attempt produces a [`BackupRecord`] that is handed to a
//! [`MetadataStore`]. The store also answers "when did the last successful
//! backup happen", which the scheduler uses for frequency throttling.
//!
//! - `JsonlMetadataStore`: append-only JSON-lines file, one record per line
//! - `MemoryMetadataStore`: records held in process memory

mod jsonl;
mod memory;
mod record;

pub use jsonl::JsonlMetadataStore;
pub use memory::MemoryMetadataStore;
pub use record::{
    format_timestamp, parse_timestamp, BackupRecord, BackupStatus, LastBackupInfo,
};

use crate::error::KeeperResult;

/// Persistence for backup records
///
/// Errors returned here never change the outcome of the backup that produced
/// the record; callers log them and move on.
pub trait MetadataStore: Send + Sync {
    /// Persist a record, taking ownership of it
    fn record_backup(&self, record: BackupRecord) -> KeeperResult<()>;

    /// The newest successful backup, or `None` if there has never been one
    fn last_backup_info(&self) -> KeeperResult<Option<LastBackupInfo>>;
}
