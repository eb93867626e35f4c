//! Automatic backup scheduler
//!
//! Spawns a tokio task that synthesizes an `auto_schedule` trigger, then
//! sleeps for the configured frequency in bounded increments so that
//! [`Scheduler::stop`] is observed promptly. Throttling against the last
//! successful backup is left to the backup gate, so a restart never causes
//! a burst of backups.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backup::{TriggerEvent, TriggerPayload, TriggerStatus};
use crate::error::{KeeperError, KeeperResult};
use crate::services::BackupService;

/// Longest single sleep between stop-signal checks
const MAX_SLEEP_INCREMENT: Duration = Duration::from_secs(60);

/// How long `stop()` waits for the loop to exit
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle state of a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// A running loop and the token that stops it
struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Background loop that periodically triggers backups
pub struct Scheduler {
    service: Arc<BackupService>,
    /// `Some` while the loop is running
    running: Mutex<Option<LoopHandle>>,
    sleep_increment: Duration,
    stop_timeout: Duration,
}

impl Scheduler {
    /// Create a stopped scheduler
    pub fn new(service: Arc<BackupService>) -> Self {
        Self {
            service,
            running: Mutex::new(None),
            sleep_increment: MAX_SLEEP_INCREMENT,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    /// Override the sleep increment (clamped to at most 60 s)
    pub fn with_sleep_increment(mut self, increment: Duration) -> Self {
        self.sleep_increment = increment.clamp(Duration::from_millis(1), MAX_SLEEP_INCREMENT);
        self
    }

    /// Override how long `stop()` waits for the loop
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        match self.running.lock() {
            Ok(guard) if guard.as_ref().is_some_and(|h| !h.task.is_finished()) => {
                SchedulerState::Running
            }
            _ => SchedulerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Start the loop if backups and automatic scheduling are both enabled
    ///
    /// Starting an already running scheduler is a no-op. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> KeeperResult<SchedulerState> {
        let config = self.service.config();
        if !config.scheduling_active() {
            info!(
                target: "keeper::scheduler",
                enabled = config.enabled,
                auto_scheduling = config.auto_scheduling_enabled,
                "automatic backup scheduling is disabled in configuration"
            );
            return Ok(SchedulerState::Stopped);
        }

        let mut guard = self
            .running
            .lock()
            .map_err(|_| KeeperError::Runtime("scheduler state lock poisoned".into()))?;

        if guard.as_ref().is_some_and(|h| !h.task.is_finished()) {
            warn!(target: "keeper::scheduler", "automatic backup scheduler is already running");
            return Ok(SchedulerState::Running);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| KeeperError::Runtime(e.to_string()))?;

        let cancel = CancellationToken::new();
        let worker = SchedulerLoop {
            service: Arc::clone(&self.service),
            cancel: cancel.clone(),
            period: config.frequency(),
            increment: self.sleep_increment,
        };
        let task = runtime.spawn(worker.run());
        *guard = Some(LoopHandle { cancel, task });

        info!(
            target: "keeper::scheduler",
            frequency_hours = config.frequency_hours,
            "automatic backup scheduler started"
        );
        Ok(SchedulerState::Running)
    }

    /// Signal the loop to stop and wait a bounded time for it to exit
    ///
    /// Never blocks longer than the stop timeout. A backup copy that is
    /// already running is not interrupted.
    pub async fn stop(&self) {
        let handle = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(LoopHandle { cancel, task }) = handle else {
            info!(target: "keeper::scheduler", "scheduler is not running");
            return;
        };

        info!(target: "keeper::scheduler", "stopping automatic backup scheduler");
        cancel.cancel();

        match tokio::time::timeout(self.stop_timeout, task).await {
            Ok(Ok(())) => info!(target: "keeper::scheduler", "scheduler stopped"),
            Ok(Err(e)) => error!(target: "keeper::scheduler", error = %e, "scheduler task failed"),
            Err(_) => warn!(
                target: "keeper::scheduler",
                timeout_secs = self.stop_timeout.as_secs_f64(),
                "scheduler did not stop in time"
            ),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.running.lock() {
            if let Some(handle) = guard.take() {
                handle.cancel.cancel();
            }
        }
    }
}

/// State owned by the spawned loop task
struct SchedulerLoop {
    service: Arc<BackupService>,
    cancel: CancellationToken,
    period: Duration,
    increment: Duration,
}

impl SchedulerLoop {
    async fn run(self) {
        info!(target: "keeper::scheduler", "backup scheduler loop started");

        while !self.cancel.is_cancelled() {
            self.tick().await;

            if !self.sleep_period().await {
                break;
            }
        }

        info!(target: "keeper::scheduler", "backup scheduler loop stopped");
    }

    /// One pass through the trigger pipeline; never ends the loop
    ///
    /// The trigger reads the metadata store and touches the filesystem, so it
    /// runs on the blocking pool.
    async fn tick(&self) {
        debug!(target: "keeper::scheduler", "scheduler checking for backup");
        let service = Arc::clone(&self.service);
        let triggered = tokio::task::spawn_blocking(move || {
            service.trigger(TriggerEvent::AutoSchedule, TriggerPayload::default())
        })
        .await;

        let outcome = match triggered {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(target: "keeper::scheduler", error = %e, "scheduled trigger task failed");
                return;
            }
        };

        match outcome.status {
            TriggerStatus::Pending => info!(
                target: "keeper::scheduler",
                backup_id = outcome.backup_id.as_deref().unwrap_or(""),
                "scheduled backup started"
            ),
            TriggerStatus::Skipped => {
                debug!(target: "keeper::scheduler", message = %outcome.message, "scheduled backup skipped")
            }
            TriggerStatus::Error | TriggerStatus::NotImplemented => error!(
                target: "keeper::scheduler",
                status = %outcome.status,
                message = %outcome.message,
                "scheduled backup could not be started"
            ),
        }
    }

    /// Sleep for one period in bounded increments
    ///
    /// Returns `false` if cancelled before the period elapsed.
    async fn sleep_period(&self) -> bool {
        let mut remaining = self.period;
        while !remaining.is_zero() {
            let step = remaining.min(self.increment);
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(step) => {}
            }
            remaining = remaining.saturating_sub(step);
        }
        !self.cancel.is_cancelled()
    }
}
