//! Trigger events and the immediate responses to them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::executor::BackupHandle;
use crate::error::KeeperError;

/// Why a backup is being attempted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    /// Operator asked for a backup; never throttled
    ManualTrigger,
    /// Synthesized by the scheduler; subject to the frequency policy
    AutoSchedule,
    /// Application-defined event, e.g. a sync notification
    Custom(String),
}

impl TriggerEvent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ManualTrigger => "manual_trigger",
            Self::AutoSchedule => "auto_schedule",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerEvent {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "manual_trigger" | "manual" => Self::ManualTrigger,
            "auto_schedule" | "scheduled" => Self::AutoSchedule,
            other => Self::Custom(other.to_string()),
        })
    }
}

/// Optional context carried with a trigger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    /// Free-form reason, copied into the record message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_reason: Option<String>,
}

impl TriggerPayload {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            trigger_reason: Some(reason.into()),
        }
    }
}

/// Immediate status of a trigger call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// Nothing was started
    Skipped,
    /// A backup task was started
    Pending,
    /// A pre-flight check failed
    Error,
    /// The configured strategy or feature does not exist
    NotImplemented,
}

impl TriggerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Pending => "pending",
            Self::Error => "error",
            Self::NotImplemented => "not_implemented",
        }
    }
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a trigger call returns, without waiting for the copy
#[derive(Debug)]
pub struct TriggerOutcome {
    pub status: TriggerStatus,
    pub message: String,
    /// Backup id of the started attempt
    pub backup_id: Option<String>,
    /// Handle to the running copy, present when `status` is `Pending`
    pub handle: Option<BackupHandle>,
    /// The pre-flight failure, present when `status` is `Error`
    pub error: Option<KeeperError>,
}

impl TriggerOutcome {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self::without_task(TriggerStatus::Skipped, message)
    }

    pub fn error(err: KeeperError) -> Self {
        let mut outcome = Self::without_task(TriggerStatus::Error, err.to_string());
        outcome.error = Some(err);
        outcome
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::without_task(TriggerStatus::NotImplemented, message)
    }

    pub fn pending(handle: BackupHandle) -> Self {
        Self {
            status: TriggerStatus::Pending,
            message: "Backup process initiated asynchronously.".to_string(),
            backup_id: Some(handle.backup_id().to_string()),
            handle: Some(handle),
            error: None,
        }
    }

    fn without_task(status: TriggerStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            backup_id: None,
            handle: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TriggerStatus::Pending
    }
}
