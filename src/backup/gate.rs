//! Decides whether a triggered backup should run now
//!
//! Checks, in order: the master switch, the frequency policy (scheduled
//! triggers only), and the configured strategy. Manual triggers are never
//! throttled. Anything ambiguous about the previous backup fails open.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::trigger::TriggerEvent;
use crate::config::{BackupConfig, BackupStrategy};
use crate::error::KeeperError;
use crate::metadata::{parse_timestamp, BackupStatus, MetadataStore};

/// Why a backup was not started
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Backups are switched off
    Disabled,
    /// The last successful backup is more recent than the configured frequency
    FrequencyNotElapsed { last_backup: DateTime<Utc> },
    /// The configured strategy has no implementation
    StrategyNotImplemented(String),
}

impl SkipReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::FrequencyNotElapsed { .. } => "frequency_not_elapsed",
            Self::StrategyNotImplemented(_) => "strategy_not_implemented",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Backup is disabled."),
            Self::FrequencyNotElapsed { .. } => write!(f, "Backup interval not yet reached."),
            Self::StrategyNotImplemented(name) => {
                write!(f, "Backup strategy '{}' not implemented.", name)
            }
        }
    }
}

/// Result of evaluating a trigger
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Proceed,
    Skip(SkipReason),
}

impl GateDecision {
    pub fn should_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Policy check in front of the executor
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupGate;

impl BackupGate {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a trigger at time `now`
    ///
    /// The metadata store is only consulted for scheduled triggers on an
    /// enabled configuration.
    pub fn evaluate(
        &self,
        event: &TriggerEvent,
        config: &BackupConfig,
        store: &dyn MetadataStore,
        now: DateTime<Utc>,
    ) -> GateDecision {
        if !config.enabled {
            info!(target: "keeper::gate", event = %event, "backup is disabled in configuration");
            return GateDecision::Skip(SkipReason::Disabled);
        }

        if *event == TriggerEvent::AutoSchedule {
            if let Some(last_backup) = self.throttled_by(config, store, now) {
                info!(
                    target: "keeper::gate",
                    last_backup = %last_backup,
                    frequency_hours = config.frequency_hours,
                    "backup skipped due to frequency policy"
                );
                return GateDecision::Skip(SkipReason::FrequencyNotElapsed { last_backup });
            }
        }

        if let BackupStrategy::Unsupported(name) = &config.strategy {
            warn!(target: "keeper::gate", strategy = %name, "backup strategy not implemented");
            return GateDecision::Skip(SkipReason::StrategyNotImplemented(name.clone()));
        }

        GateDecision::Proceed
    }

    /// Timestamp of a successful backup within the frequency window, if any
    fn throttled_by(
        &self,
        config: &BackupConfig,
        store: &dyn MetadataStore,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let info = match store.last_backup_info() {
            Ok(Some(info)) => info,
            Ok(None) => {
                info!(target: "keeper::gate", "no previous successful backup found, proceeding");
                return None;
            }
            Err(e) => {
                warn!(
                    target: "keeper::gate",
                    error = %e,
                    "could not retrieve last backup info, proceeding"
                );
                return None;
            }
        };

        if info.status != BackupStatus::Success || info.timestamp.trim().is_empty() {
            info!(target: "keeper::gate", "no valid timestamp for last successful backup, proceeding");
            return None;
        }

        let Some(last_backup) = parse_timestamp(&info.timestamp) else {
            let err = KeeperError::InvalidTimestampFormat(info.timestamp.clone());
            warn!(target: "keeper::gate", error = %err, "proceeding with backup");
            return None;
        };

        let Some(window) = frequency_window(config.frequency_hours) else {
            debug!(
                target: "keeper::gate",
                frequency_hours = config.frequency_hours,
                "frequency window is not positive, proceeding"
            );
            return None;
        };
        let elapsed = now - last_backup;
        debug!(
            target: "keeper::gate",
            elapsed_secs = elapsed.num_seconds(),
            window_secs = window.num_seconds(),
            "checked backup frequency"
        );

        (elapsed < window).then_some(last_backup)
    }
}

/// The throttling window for `frequency_hours`, saturating at the largest duration
///
/// Returns `None` for zero, negative, or NaN values.
fn frequency_window(frequency_hours: f64) -> Option<Duration> {
    let millis = frequency_hours * 3_600_000.0;
    if millis.is_nan() || millis <= 0.0 {
        return None;
    }
    // Float to int casts saturate, so huge values land on i64::MAX
    Duration::try_milliseconds(millis as i64)
}
