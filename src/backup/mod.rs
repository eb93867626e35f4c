//! Backup pipeline for keeper
//!
//! Turns a trigger into a backup file plus a metadata record.
//!
//! # Architecture
//!
//! - `BackupGate`: decides whether a trigger should run now (enabled switch,
//!   frequency policy for scheduled triggers, strategy check)
//! - `BackupExecutor`: pre-flight checks, then copies the source file on a
//!   background worker and submits the resulting record
//! - `RetentionPolicy`: keeps the newest N backups of a source file
//! - `BackupPattern`: the `{stem}_backup_{YYYYMMDD_HHMMSS}{ext}` naming scheme
//!
//! # Example
//!
//! ```rust,ignore
//! use keeper::backup::{BackupExecutor, BackupRequest, TriggerEvent, TriggerPayload};
//!
//! let executor = BackupExecutor::new(config, store);
//! let handle = executor.run(BackupRequest {
//!     source: "/data/app.db".into(),
//!     target_dir: "/backups".into(),
//!     event: TriggerEvent::ManualTrigger,
//!     payload: TriggerPayload::default(),
//! })?;
//! let record = handle.wait().await?;
//! ```

mod executor;
mod gate;
mod pattern;
mod retention;
mod trigger;

pub use executor::{BackupExecutor, BackupHandle, BackupRequest};
pub use gate::{BackupGate, GateDecision, SkipReason};
pub use pattern::BackupPattern;
pub use retention::{BackupFile, RetentionPolicy, RetentionReport};
pub use trigger::{TriggerEvent, TriggerOutcome, TriggerPayload, TriggerStatus};
