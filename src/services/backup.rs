//! Backup service
//!
//! Single entry point for every backup trigger. Manual triggers, sync
//! events, and the scheduler all go through [`BackupService::trigger`], so
//! they share the same gate and executor.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::backup::{
    BackupExecutor, BackupGate, BackupRequest, GateDecision, SkipReason, TriggerEvent,
    TriggerOutcome, TriggerPayload,
};
use crate::config::{BackupConfig, ConfigProvider};
use crate::error::{KeeperError, KeeperResult};
use crate::metadata::MetadataStore;

/// Service for triggering backups
pub struct BackupService {
    provider: Arc<dyn ConfigProvider>,
    config: RwLock<BackupConfig>,
    store: Arc<dyn MetadataStore>,
    gate: BackupGate,
    executor: BackupExecutor,
}

impl BackupService {
    /// Create a service, taking a configuration snapshot from `provider`
    pub fn new(
        provider: Arc<dyn ConfigProvider>,
        store: Arc<dyn MetadataStore>,
    ) -> KeeperResult<Self> {
        let config = BackupConfig::load(provider.as_ref())?;
        let executor = BackupExecutor::new(Arc::clone(&provider), Arc::clone(&store));

        info!(
            target: "keeper::service",
            enabled = config.enabled,
            auto_scheduling = config.auto_scheduling_enabled,
            strategy = %config.strategy,
            "backup service initialized"
        );

        Ok(Self {
            provider,
            config: RwLock::new(config),
            store,
            gate: BackupGate::new(),
            executor,
        })
    }

    /// Current configuration snapshot
    pub fn config(&self) -> BackupConfig {
        match self.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the snapshot with a fresh read from the provider
    ///
    /// The old snapshot stays in place if the new one is invalid.
    pub fn reload_config(&self) -> KeeperResult<BackupConfig> {
        let fresh = BackupConfig::load(self.provider.as_ref())?;
        let mut guard = self
            .config
            .write()
            .map_err(|_| KeeperError::Config("configuration lock poisoned".into()))?;
        *guard = fresh.clone();
        info!(target: "keeper::service", "backup configuration reloaded");
        Ok(fresh)
    }

    /// The metadata store records are submitted to
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Whether a backup copy is currently running
    pub fn is_backup_running(&self) -> bool {
        self.executor.is_busy()
    }

    /// Trigger a backup
    ///
    /// Returns as soon as the attempt is started or rejected. A `Pending`
    /// outcome carries a handle to the running copy; the final result is
    /// only visible through the recorded metadata.
    pub fn trigger(&self, event: TriggerEvent, payload: TriggerPayload) -> TriggerOutcome {
        info!(
            target: "keeper::service",
            event = %event,
            reason = payload.trigger_reason.as_deref().unwrap_or(""),
            "backup trigger received"
        );

        let config = self.config();

        match self
            .gate
            .evaluate(&event, &config, self.store.as_ref(), Utc::now())
        {
            GateDecision::Proceed => {}
            GateDecision::Skip(reason @ SkipReason::StrategyNotImplemented(_)) => {
                return TriggerOutcome::not_implemented(reason.to_string());
            }
            GateDecision::Skip(reason) => return TriggerOutcome::skipped(reason.to_string()),
        }

        let request = BackupRequest {
            source: config.source_path.clone(),
            target_dir: config.target_directory.clone(),
            event,
            payload,
        };

        match self.executor.run(request) {
            Ok(handle) => TriggerOutcome::pending(handle),
            Err(KeeperError::BackupInProgress) => {
                warn!(target: "keeper::service", "backup already in progress, skipping trigger");
                TriggerOutcome::skipped("A backup is already in progress.")
            }
            Err(e) => {
                error!(target: "keeper::service", error = %e, "backup could not be started");
                TriggerOutcome::error(e)
            }
        }
    }

    /// Trigger a data sync
    ///
    /// Sync has no implementation yet; this only reports whether it would
    /// have run.
    pub fn trigger_sync(&self, event: TriggerEvent, payload: TriggerPayload) -> TriggerOutcome {
        info!(
            target: "keeper::service",
            event = %event,
            reason = payload.trigger_reason.as_deref().unwrap_or(""),
            "sync trigger received"
        );

        if !self.config().sync_enabled {
            return TriggerOutcome::skipped("Sync is disabled.");
        }
        TriggerOutcome::not_implemented("Sync feature not yet implemented.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::TriggerStatus;
    use crate::config::provider::keys;
    use crate::config::MapConfigProvider;
    use crate::metadata::{BackupRecord, BackupStatus, MemoryMetadataStore};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        source: PathBuf,
        target: PathBuf,
        provider: Arc<MapConfigProvider>,
        store: Arc<MemoryMetadataStore>,
    }

    impl Fixture {
        fn new(enabled: bool) -> Self {
            let temp = TempDir::new().unwrap();
            let source = temp.path().join("app.db");
            fs::write(&source, vec![1u8; 4096]).unwrap();
            let target = temp.path().join("backups");
            let provider = Arc::new(
                MapConfigProvider::new()
                    .with(keys::BACKUP_ENABLED, enabled)
                    .with(keys::AUTO_SCHEDULING_ENABLED, false)
                    .with(keys::FREQUENCY_HOURS, 24)
                    .with(keys::RETENTION_COUNT, 3)
                    .with(keys::SOURCE_DB_PATH, source.display().to_string())
                    .with(keys::TARGET_DIRECTORY, target.display().to_string()),
            );
            Self {
                _temp: temp,
                source,
                target,
                provider,
                store: Arc::new(MemoryMetadataStore::new()),
            }
        }

        fn service(&self) -> BackupService {
            BackupService::new(self.provider.clone(), self.store.clone()).unwrap()
        }

        fn seed_success(&self, hours_ago: i64) {
            let timestamp = Utc::now() - chrono::Duration::hours(hours_ago);
            self.store
                .record_backup(BackupRecord {
                    backup_id: "seed".into(),
                    timestamp,
                    size_bytes: 1,
                    status: BackupStatus::Success,
                    trigger_reason: "manual_trigger".into(),
                    path: "seed".into(),
                    duration_seconds: 0.0,
                    message: "Backup completed.".into(),
                    error_message: None,
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_disabled_skips_without_writes() {
        let fixture = Fixture::new(false);
        let service = fixture.service();

        for event in [TriggerEvent::ManualTrigger, TriggerEvent::AutoSchedule] {
            let outcome = service.trigger(event, TriggerPayload::default());
            assert_eq!(outcome.status, TriggerStatus::Skipped);
            assert_eq!(outcome.message, "Backup is disabled.");
        }
        assert!(!fixture.target.exists());
        assert!(fixture.store.is_empty());
    }

    #[tokio::test]
    async fn test_manual_trigger_scenario() {
        let fixture = Fixture::new(true);
        let service = fixture.service();
        let before = Utc::now();

        let outcome = service.trigger(TriggerEvent::ManualTrigger, TriggerPayload::default());
        assert_eq!(outcome.status, TriggerStatus::Pending);
        let backup_id = outcome.backup_id.clone().unwrap();

        let record = outcome.handle.unwrap().wait().await.unwrap();
        assert_eq!(record.status, BackupStatus::Success);
        assert_eq!(record.size_bytes, 4096);
        assert_eq!(record.backup_id, backup_id);

        let path = PathBuf::from(&record.path);
        assert!(path.exists());
        assert_eq!(path.parent().unwrap(), fixture.target.as_path());

        // Name carries the UTC clock at call time, to the second
        let stamp = record.timestamp.format("%Y%m%d_%H%M%S").to_string();
        assert!(record.timestamp.timestamp() >= before.timestamp());
        assert!(
            backup_id == format!("app_backup_{}.db", stamp)
                || backup_id.starts_with(&format!("app_backup_{}_", stamp))
        );
        assert_eq!(fixture.store.len(), 1);
        assert_eq!(fs::metadata(&fixture.source).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_auto_schedule_throttled_by_recent_backup() {
        let fixture = Fixture::new(true);
        fixture.seed_success(1);
        let service = fixture.service();

        let outcome = service.trigger(TriggerEvent::AutoSchedule, TriggerPayload::default());

        assert_eq!(outcome.status, TriggerStatus::Skipped);
        assert_eq!(outcome.message, "Backup interval not yet reached.");
        assert!(!fixture.target.exists());
    }

    #[tokio::test]
    async fn test_auto_schedule_after_frequency() {
        let fixture = Fixture::new(true);
        fixture.seed_success(25);
        let service = fixture.service();

        let outcome = service.trigger(TriggerEvent::AutoSchedule, TriggerPayload::default());

        assert_eq!(outcome.status, TriggerStatus::Pending);
        let record = outcome.handle.unwrap().wait().await.unwrap();
        assert_eq!(record.trigger_reason, "auto_schedule");
    }

    #[tokio::test]
    async fn test_manual_trigger_not_throttled() {
        let fixture = Fixture::new(true);
        fixture.seed_success(0);
        let service = fixture.service();

        let outcome = service.trigger(TriggerEvent::ManualTrigger, TriggerPayload::default());

        assert_eq!(outcome.status, TriggerStatus::Pending);
        outcome.handle.unwrap().wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_source_returns_error() {
        let fixture = Fixture::new(true);
        fs::remove_file(&fixture.source).unwrap();
        let service = fixture.service();

        let outcome = service.trigger(TriggerEvent::ManualTrigger, TriggerPayload::default());

        assert_eq!(outcome.status, TriggerStatus::Error);
        assert!(outcome.message.starts_with("Source file not found"));
        assert!(matches!(outcome.error, Some(KeeperError::SourceNotFound(_))));
        assert!(outcome.handle.is_none());
        assert!(fixture.store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_strategy_not_implemented() {
        let fixture = Fixture::new(true);
        fixture.provider.set(keys::STRATEGY, "cloud");
        let service = fixture.service();

        let outcome = service.trigger(TriggerEvent::ManualTrigger, TriggerPayload::default());

        assert_eq!(outcome.status, TriggerStatus::NotImplemented);
        assert!(!fixture.target.exists());
    }

    #[tokio::test]
    async fn test_reload_config() {
        let fixture = Fixture::new(false);
        let service = fixture.service();
        assert!(!service.config().enabled);

        fixture.provider.set(keys::BACKUP_ENABLED, true);
        assert!(!service.config().enabled);

        let fresh = service.reload_config().unwrap();
        assert!(fresh.enabled);
        assert!(service.config().enabled);
    }

    #[tokio::test]
    async fn test_invalid_reload_keeps_snapshot() {
        let fixture = Fixture::new(true);
        let service = fixture.service();

        fixture.provider.set(keys::AUTO_SCHEDULING_ENABLED, true);
        fixture.provider.set(keys::FREQUENCY_HOURS, -1);

        assert!(service.reload_config().is_err());
        assert!(!service.config().auto_scheduling_enabled);
    }

    #[tokio::test]
    async fn test_sync_trigger() {
        let fixture = Fixture::new(true);
        let service = fixture.service();
        let outcome = service.trigger_sync(
            TriggerEvent::Custom("sync_requested".into()),
            TriggerPayload::default(),
        );
        assert_eq!(outcome.status, TriggerStatus::Skipped);

        fixture.provider.set(keys::SYNC_ENABLED, true);
        service.reload_config().unwrap();
        let outcome = service.trigger_sync(
            TriggerEvent::Custom("sync_requested".into()),
            TriggerPayload::default(),
        );
        assert_eq!(outcome.status, TriggerStatus::NotImplemented);
    }
}
