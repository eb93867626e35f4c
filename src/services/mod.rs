//! Service layer for keeper
//!
//! The service layer ties configuration, the backup gate and the executor
//! together behind a single trigger entry point.

pub mod backup;

pub use backup::BackupService;
