//! keeper - scheduled file backups with retention
//!
//! This library copies a primary data file (typically a database) into a
//! backup directory, either on demand or from a background scheduler, keeps
//! the newest N copies, and records the outcome of every attempt through a
//! pluggable metadata store.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Paths, settings file, key/value provider and config snapshot
//! - `error`: Custom error types
//! - `metadata`: Backup records and their persistence
//! - `backup`: Gate, executor, retention policy and file naming
//! - `services`: The trigger entry point shared by all callers
//! - `scheduler`: Background loop that triggers scheduled backups
//! - `cli`: Command handlers for the `keeper` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keeper::backup::{TriggerEvent, TriggerPayload};
//! use keeper::config::{KeeperPaths, SettingsProvider};
//! use keeper::metadata::JsonlMetadataStore;
//! use keeper::scheduler::Scheduler;
//! use keeper::services::BackupService;
//!
//! let paths = KeeperPaths::new()?;
//! let provider = Arc::new(SettingsProvider::load(paths.clone())?);
//! let store = Arc::new(JsonlMetadataStore::new(paths.metadata_log()));
//! let service = Arc::new(BackupService::new(provider, store)?);
//!
//! let outcome = service.trigger(TriggerEvent::ManualTrigger, TriggerPayload::default());
//!
//! let scheduler = Scheduler::new(service);
//! scheduler.start()?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod scheduler;
pub mod services;

pub use error::{KeeperError, KeeperResult};
