//! Backup execution
//!
//! [`BackupExecutor::run`] performs the pre-flight checks on the calling
//! task, then hands the copy to a blocking worker and returns immediately.
//! Everything that can go wrong after the hand-off is captured in the
//! resulting [`BackupRecord`]; nothing is propagated to the caller.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::pattern::BackupPattern;
use super::retention::RetentionPolicy;
use super::trigger::{TriggerEvent, TriggerPayload};
use crate::config::provider::{keys, ConfigProvider, ConfigProviderExt};
use crate::error::{KeeperError, KeeperResult};
use crate::metadata::{BackupRecord, BackupStatus, MetadataStore};

/// Inputs for one backup attempt
#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub source: PathBuf,
    pub target_dir: PathBuf,
    pub event: TriggerEvent,
    pub payload: TriggerPayload,
}

/// A backup copy running in the background
///
/// Dropping the handle detaches the task; the copy still runs to completion
/// and its record is still submitted.
#[derive(Debug)]
pub struct BackupHandle {
    backup_id: String,
    path: PathBuf,
    task: JoinHandle<BackupRecord>,
}

impl BackupHandle {
    pub fn backup_id(&self) -> &str {
        &self.backup_id
    }

    /// Destination of the backup file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the copy to finish and return its record
    pub async fn wait(self) -> KeeperResult<BackupRecord> {
        self.task
            .await
            .map_err(|e| KeeperError::Runtime(format!("backup task failed: {}", e)))
    }
}

/// Runs file-copy backups, one at a time
pub struct BackupExecutor {
    config: Arc<dyn ConfigProvider>,
    store: Arc<dyn MetadataStore>,
    in_flight: Arc<Semaphore>,
}

impl BackupExecutor {
    pub fn new(config: Arc<dyn ConfigProvider>, store: Arc<dyn MetadataStore>) -> Self {
        Self {
            config,
            store,
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    /// Whether a backup copy is currently running
    pub fn is_busy(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    /// Start a backup attempt
    ///
    /// # Errors
    ///
    /// Fails synchronously, without starting any work, when the source is
    /// missing (`SourceNotFound`), the target directory cannot be created
    /// (`DirectoryCreateFailed`), another backup is still running
    /// (`BackupInProgress`), or there is no tokio runtime (`Runtime`).
    pub fn run(&self, request: BackupRequest) -> KeeperResult<BackupHandle> {
        if !request.source.exists() {
            error!(
                target: "keeper::executor",
                source = %request.source.display(),
                "source file not found"
            );
            return Err(KeeperError::SourceNotFound(request.source));
        }

        fs::create_dir_all(&request.target_dir).map_err(|e| {
            error!(
                target: "keeper::executor",
                dir = %request.target_dir.display(),
                error = %e,
                "failed to create backup directory"
            );
            KeeperError::DirectoryCreateFailed {
                path: request.target_dir.clone(),
                reason: e.to_string(),
            }
        })?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| KeeperError::Runtime(e.to_string()))?;

        let permit = Arc::clone(&self.in_flight)
            .try_acquire_owned()
            .map_err(|_| KeeperError::BackupInProgress)?;

        let started_at = Utc::now();
        let pattern = BackupPattern::from_source(&request.source);
        let destination = pattern.unique_destination(&request.target_dir, &started_at);
        let backup_id = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| pattern.file_name(&started_at));

        let job = CopyJob {
            backup_id: backup_id.clone(),
            source: request.source,
            target_dir: request.target_dir,
            destination: destination.clone(),
            pattern,
            event: request.event,
            payload: request.payload,
            started_at,
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
        };

        let task = runtime.spawn_blocking(move || job.execute(permit));
        info!(target: "keeper::executor", backup_id = %backup_id, "backup task started");

        Ok(BackupHandle {
            backup_id,
            path: destination,
            task,
        })
    }
}

/// Everything the background worker needs for one attempt
struct CopyJob {
    backup_id: String,
    source: PathBuf,
    target_dir: PathBuf,
    destination: PathBuf,
    pattern: BackupPattern,
    event: TriggerEvent,
    payload: TriggerPayload,
    started_at: DateTime<Utc>,
    config: Arc<dyn ConfigProvider>,
    store: Arc<dyn MetadataStore>,
}

impl CopyJob {
    /// Copy, clean up, and record; the permit is released when this returns
    fn execute(self, _permit: OwnedSemaphorePermit) -> BackupRecord {
        debug!(
            target: "keeper::executor",
            source = %self.source.display(),
            destination = %self.destination.display(),
            "copying backup"
        );

        let clock = Instant::now();
        let outcome = copy_preserving_metadata(&self.source, &self.destination);
        let duration_seconds = clock.elapsed().as_secs_f64();

        let (status, size_bytes, error_message) = match outcome {
            Ok(size) => {
                info!(
                    target: "keeper::executor",
                    path = %self.destination.display(),
                    size_bytes = size,
                    "backup file written"
                );
                (BackupStatus::Success, size, None)
            }
            Err(e) => {
                let err = KeeperError::CopyFailed(e.to_string());
                error!(
                    target: "keeper::executor",
                    path = %self.destination.display(),
                    error = %err,
                    "backup failed"
                );
                (BackupStatus::Failed, 0, Some(e.to_string()))
            }
        };

        if status == BackupStatus::Success {
            self.apply_retention();
        }

        let record = self.build_record(status, size_bytes, duration_seconds, error_message);

        if let Err(e) = self.store.record_backup(record.clone()) {
            error!(
                target: "keeper::executor",
                backup_id = %self.backup_id,
                error = %e,
                "failed to record backup metadata"
            );
        }

        record
    }

    /// Retention with the configuration as it is now, not as it was at trigger time
    fn apply_retention(&self) {
        let retention_count = self.config.get_u32(keys::RETENTION_COUNT, 5);
        let target_dir = self
            .config
            .get_path(keys::TARGET_DIRECTORY, self.target_dir.clone());

        let report = RetentionPolicy::new(retention_count, self.pattern.clone())
            .apply(&target_dir, Some(&self.destination));

        if !report.is_clean() {
            warn!(
                target: "keeper::executor",
                failed = report.failed.len(),
                "some old backups could not be removed"
            );
        }
    }

    fn build_record(
        &self,
        status: BackupStatus,
        size_bytes: u64,
        duration_seconds: f64,
        error_message: Option<String>,
    ) -> BackupRecord {
        let base_message = match (&status, &error_message) {
            (_, Some(err)) => err.clone(),
            (BackupStatus::Success, None) => "Backup completed.".to_string(),
            (BackupStatus::Failed, None) => "Backup process finished.".to_string(),
        };
        let message = match &self.payload.trigger_reason {
            Some(reason) => format!("Reason: {}. {}", reason, base_message),
            None => base_message,
        };

        BackupRecord {
            backup_id: self.backup_id.clone(),
            timestamp: self.started_at,
            size_bytes,
            status,
            trigger_reason: self.event.to_string(),
            path: self.destination.display().to_string(),
            duration_seconds: (duration_seconds * 100.0).round() / 100.0,
            message,
            error_message,
        }
    }
}

/// Copy `source` to `destination`, keeping permissions and mtime
///
/// Never overwrites an existing `destination`. If the copy fails after the
/// file was created, the partial file is removed. Returns the size of the
/// written file.
fn copy_preserving_metadata(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let metadata = reader.metadata()?;

    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    let written = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .and_then(|_| writer.set_modified(metadata.modified()?))
        .and_then(|_| writer.set_permissions(metadata.permissions()));
    drop(writer);

    if let Err(e) = written {
        remove_partial(destination);
        return Err(e);
    }

    Ok(fs::metadata(destination)?.len())
}

fn remove_partial(destination: &Path) {
    if let Err(e) = fs::remove_file(destination) {
        warn!(
            target: "keeper::executor",
            path = %destination.display(),
            error = %e,
            "failed to remove partial backup file"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfigProvider;
    use crate::error::KeeperResult;
    use crate::metadata::{LastBackupInfo, MemoryMetadataStore};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct RejectingStore;

    impl MetadataStore for RejectingStore {
        fn record_backup(&self, _record: BackupRecord) -> KeeperResult<()> {
            Err(KeeperError::MetadataRecordFailed("disk full".into()))
        }

        fn last_backup_info(&self) -> KeeperResult<Option<LastBackupInfo>> {
            Ok(None)
        }
    }

    struct Fixture {
        temp: TempDir,
        source: PathBuf,
        target: PathBuf,
    }

    impl Fixture {
        fn new(source_len: usize) -> Self {
            let temp = TempDir::new().unwrap();
            let source = temp.path().join("data").join("app.db");
            fs::create_dir_all(source.parent().unwrap()).unwrap();
            fs::write(&source, vec![7u8; source_len]).unwrap();
            let target = temp.path().join("backups");
            Self { temp, source, target }
        }

        fn request(&self, event: TriggerEvent, payload: TriggerPayload) -> BackupRequest {
            BackupRequest {
                source: self.source.clone(),
                target_dir: self.target.clone(),
                event,
                payload,
            }
        }
    }

    fn executor_with(
        config: MapConfigProvider,
        store: Arc<dyn MetadataStore>,
    ) -> BackupExecutor {
        BackupExecutor::new(Arc::new(config), store)
    }

    #[tokio::test]
    async fn test_successful_copy() {
        let fixture = Fixture::new(4096);
        let store = Arc::new(MemoryMetadataStore::new());
        let executor = executor_with(MapConfigProvider::new(), store.clone());

        let handle = executor
            .run(fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default()))
            .unwrap();
        let expected_path = handle.path().to_path_buf();
        let record = handle.wait().await.unwrap();

        assert_eq!(record.status, BackupStatus::Success);
        assert_eq!(record.size_bytes, 4096);
        assert_eq!(record.trigger_reason, "manual_trigger");
        assert_eq!(record.message, "Backup completed.");
        assert!(record.error_message.is_none());
        assert_eq!(PathBuf::from(&record.path), expected_path);
        assert!(expected_path.exists());
        assert!(record
            .backup_id
            .starts_with(&format!("app_backup_{}", record.timestamp.format("%Y%m%d"))));
        assert_eq!(store.records(), vec![record]);
    }

    #[tokio::test]
    async fn test_copy_preserves_mtime() {
        let fixture = Fixture::new(16);
        let mtime = SystemTime::now() - Duration::from_secs(7200);
        File::options()
            .write(true)
            .open(&fixture.source)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        let executor = executor_with(MapConfigProvider::new(), Arc::new(MemoryMetadataStore::new()));

        let record = executor
            .run(fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default()))
            .unwrap()
            .wait()
            .await
            .unwrap();

        let copied = fs::metadata(&record.path).unwrap().modified().unwrap();
        assert_eq!(copied, mtime);
    }

    #[tokio::test]
    async fn test_missing_source_is_synchronous() {
        let fixture = Fixture::new(1);
        fs::remove_file(&fixture.source).unwrap();
        let store = Arc::new(MemoryMetadataStore::new());
        let executor = executor_with(MapConfigProvider::new(), store.clone());

        let err = executor
            .run(fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default()))
            .unwrap_err();

        assert!(matches!(err, KeeperError::SourceNotFound(_)));
        assert!(store.is_empty());
        assert!(!fixture.target.exists());
    }

    #[tokio::test]
    async fn test_uncreatable_target_is_synchronous() {
        let fixture = Fixture::new(1);
        // A regular file where the directory should go
        let blocker = fixture.temp.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let request = BackupRequest {
            target_dir: blocker.join("backups"),
            ..fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default())
        };
        let executor = executor_with(MapConfigProvider::new(), Arc::new(MemoryMetadataStore::new()));

        let err = executor.run(request).unwrap_err();
        assert!(matches!(err, KeeperError::DirectoryCreateFailed { .. }));
    }

    #[tokio::test]
    async fn test_reason_prefixes_message() {
        let fixture = Fixture::new(8);
        let executor = executor_with(MapConfigProvider::new(), Arc::new(MemoryMetadataStore::new()));

        let record = executor
            .run(fixture.request(
                TriggerEvent::ManualTrigger,
                TriggerPayload::with_reason("before upgrade"),
            ))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(record.message, "Reason: before upgrade. Backup completed.");
    }

    #[tokio::test]
    async fn test_metadata_failure_keeps_success() {
        let fixture = Fixture::new(8);
        let executor = executor_with(MapConfigProvider::new(), Arc::new(RejectingStore));

        let record = executor
            .run(fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default()))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(record.status, BackupStatus::Success);
    }

    #[tokio::test]
    async fn test_retention_reads_current_config() {
        let fixture = Fixture::new(8);
        let config = Arc::new(
            MapConfigProvider::new()
                .with(keys::RETENTION_COUNT, 0)
                .with(keys::TARGET_DIRECTORY, fixture.target.display().to_string()),
        );
        let executor = BackupExecutor::new(config.clone(), Arc::new(MemoryMetadataStore::new()));

        fs::create_dir_all(&fixture.target).unwrap();
        for day in 1..=4 {
            fs::write(
                fixture.target.join(format!("app_backup_2020010{}_000000.db", day)),
                b"old",
            )
            .unwrap();
        }

        // Changed after construction; the running attempt must see it
        config.set(keys::RETENTION_COUNT, 2);

        let record = executor
            .run(fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default()))
            .unwrap()
            .wait()
            .await
            .unwrap();

        let remaining = RetentionPolicy::new(2, BackupPattern::from_source(&fixture.source))
            .list(&fixture.target);
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|f| f.path == PathBuf::from(&record.path)));
    }

    #[tokio::test]
    async fn test_one_backup_in_flight() {
        let fixture = Fixture::new(1024);
        let executor = executor_with(MapConfigProvider::new(), Arc::new(MemoryMetadataStore::new()));

        let _permit = Arc::clone(&executor.in_flight).try_acquire_owned().unwrap();
        assert!(executor.is_busy());

        let err = executor
            .run(fixture.request(TriggerEvent::AutoSchedule, TriggerPayload::default()))
            .unwrap_err();
        assert!(matches!(err, KeeperError::BackupInProgress));
    }

    #[tokio::test]
    async fn test_unreadable_source_records_failure() {
        let fixture = Fixture::new(1);
        // A directory passes the existence check but cannot be read as a file
        fs::remove_file(&fixture.source).unwrap();
        fs::create_dir(&fixture.source).unwrap();
        let store = Arc::new(MemoryMetadataStore::new());
        let executor = executor_with(MapConfigProvider::new(), store.clone());

        let handle = executor
            .run(fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default()))
            .unwrap();
        let destination = handle.path().to_path_buf();
        let record = handle.wait().await.unwrap();

        assert_eq!(record.status, BackupStatus::Failed);
        assert!(record.error_message.is_some());
        assert_eq!(record.size_bytes, 0);
        assert!(!destination.exists());
        assert_eq!(store.records(), vec![record]);
        assert!(!executor.is_busy());
    }

    #[test]
    fn test_copy_never_overwrites_destination() {
        let fixture = Fixture::new(32);
        fs::create_dir_all(&fixture.target).unwrap();
        let destination = fixture.target.join("app_backup_20240101_000000.db");
        fs::write(&destination, b"other process").unwrap();

        let err = copy_preserving_metadata(&fixture.source, &destination).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&destination).unwrap(), b"other process");
    }

    #[test]
    fn test_run_without_runtime() {
        let fixture = Fixture::new(1);
        let executor = executor_with(MapConfigProvider::new(), Arc::new(MemoryMetadataStore::new()));

        let err = executor
            .run(fixture.request(TriggerEvent::ManualTrigger, TriggerPayload::default()))
            .unwrap_err();
        assert!(matches!(err, KeeperError::Runtime(_)));
    }
}
