//! Backup CLI commands
//!
//! Implements CLI commands for triggering, listing and pruning backups.

use clap::Subcommand;

use crate::backup::{BackupPattern, RetentionPolicy, TriggerEvent, TriggerPayload, TriggerStatus};
use crate::error::{KeeperError, KeeperResult};
use crate::metadata::{BackupStatus, JsonlMetadataStore};
use crate::services::BackupService;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Back up the source file now
    Create {
        /// Reason recorded with the backup
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// List recorded backups
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,

        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete old backups according to the retention count
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Handle a backup command
pub async fn handle_backup_command(
    service: &BackupService,
    store: &JsonlMetadataStore,
    cmd: BackupCommands,
) -> KeeperResult<()> {
    match cmd {
        BackupCommands::Create { reason } => {
            let payload = reason.map(TriggerPayload::with_reason).unwrap_or_default();
            let outcome = service.trigger(TriggerEvent::ManualTrigger, payload);

            match (outcome.status, outcome.handle, outcome.error) {
                (TriggerStatus::Pending, Some(handle), _) => {
                    println!("Creating backup {}...", handle.backup_id());
                    let record = handle.wait().await?;
                    match record.status {
                        BackupStatus::Success => {
                            println!("Backup completed: {}", record.backup_id);
                            println!("Location: {}", record.path);
                            println!(
                                "Size: {} in {:.2}s",
                                format_size(record.size_bytes),
                                record.duration_seconds
                            );
                        }
                        BackupStatus::Failed => {
                            return Err(KeeperError::CopyFailed(
                                record.error_message.unwrap_or(record.message),
                            ));
                        }
                    }
                }
                (TriggerStatus::Skipped, _, _) => {
                    println!("Backup skipped: {}", outcome.message);
                }
                (TriggerStatus::NotImplemented, _, _) => {
                    return Err(KeeperError::StrategyNotImplemented(
                        service.config().strategy.to_string(),
                    ));
                }
                (_, _, Some(err)) => return Err(err),
                (_, _, None) => return Err(KeeperError::Runtime(outcome.message)),
            }
        }

        BackupCommands::List { verbose, limit } => {
            let records = store.read_recent(limit)?;

            if records.is_empty() {
                println!("No backups recorded.");
                println!("Create one with: keeper backup create");
                return Ok(());
            }

            println!("Recorded Backups");
            println!("================");
            println!();

            // Newest first
            for (i, record) in records.iter().rev().enumerate() {
                let age = chrono::Utc::now().signed_duration_since(record.timestamp);
                let age_str = format_duration(age);
                let failed_marker = if record.is_success() { "" } else { " [failed]" };

                if verbose {
                    println!(
                        "{}. {}{}\n   Created: {}\n   Trigger: {}\n   Size: {}\n   Duration: {:.2}s\n   Path: {}\n   Message: {}\n",
                        i + 1,
                        record.backup_id,
                        failed_marker,
                        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                        record.trigger_reason,
                        format_size(record.size_bytes),
                        record.duration_seconds,
                        record.path,
                        record.message,
                    );
                } else {
                    println!(
                        "  {}. {} ({} ago, {}){}",
                        i + 1,
                        record.backup_id,
                        age_str,
                        format_size(record.size_bytes),
                        failed_marker,
                    );
                }
            }

            println!();
            println!("Total: {} record(s)", records.len());
        }

        BackupCommands::Prune { force } => {
            let config = service.config();
            let policy = RetentionPolicy::new(
                config.retention_count,
                BackupPattern::from_source(&config.source_path),
            );
            let existing = policy.list(&config.target_directory);
            let candidates = policy.candidates(&config.target_directory, None);

            if config.retention_count == 0 {
                println!("Retention is disabled (retention_count = 0); keeping all backups.");
                return Ok(());
            }

            if candidates.is_empty() {
                println!("No backups to prune.");
                println!(
                    "Retention policy keeps {} backup(s); you have {}.",
                    config.retention_count,
                    existing.len()
                );
                return Ok(());
            }

            println!("Prune Summary");
            println!("=============");
            println!("Retention policy: keep {}", config.retention_count);
            println!("Current backups:  {}", existing.len());
            println!("To be deleted:    {}", candidates.len());
            for file in &candidates {
                println!("  - {} ({})", file.file_name, format_size(file.size_bytes));
            }
            println!();

            if !force {
                println!("To delete old backups, run again with --force flag:");
                println!("  keeper backup prune --force");
                return Ok(());
            }

            let report = policy.apply(&config.target_directory, None);
            println!("Deleted {} backup(s).", report.deleted.len());
            for (path, reason) in &report.failed {
                println!("Could not delete {}: {}", path.display(), reason);
            }
        }
    }

    Ok(())
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(4096), "4.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::minutes(90)), "1h");
        assert_eq!(format_duration(chrono::Duration::days(3)), "3d");
        assert_eq!(format_duration(chrono::Duration::seconds(-5)), "0s");
    }
}
