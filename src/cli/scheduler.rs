//! Scheduler CLI commands
//!
//! Runs the automatic backup scheduler in the foreground until Ctrl-C.

use std::sync::Arc;

use crate::error::{KeeperError, KeeperResult};
use crate::scheduler::{Scheduler, SchedulerState};
use crate::services::BackupService;

/// Run the scheduler until interrupted
pub async fn run_scheduler(service: Arc<BackupService>) -> KeeperResult<()> {
    let config = service.config();
    let scheduler = Scheduler::new(service);

    if scheduler.start()? == SchedulerState::Stopped {
        println!("Automatic scheduling is disabled.");
        println!(
            "Set backup.enabled and backup.automatic_scheduling_enabled in the settings file."
        );
        return Ok(());
    }

    println!(
        "Scheduler running: backing up {} every {}h into {}",
        config.source_path.display(),
        config.frequency_hours,
        config.target_directory.display()
    );
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| KeeperError::Runtime(format!("Failed to listen for Ctrl-C: {}", e)))?;

    println!();
    println!("Stopping scheduler...");
    scheduler.stop().await;
    Ok(())
}
