use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keeper::backup::{TriggerEvent, TriggerPayload};
use keeper::cli::{handle_backup_command, run_scheduler, BackupCommands};
use keeper::config::{paths::KeeperPaths, settings::Settings, SettingsProvider};
use keeper::metadata::JsonlMetadataStore;
use keeper::services::BackupService;

#[derive(Parser)]
#[command(
    name = "keeper",
    version,
    about = "Scheduled file backups with retention",
    long_about = "keeper copies a data file into a backup directory on demand or on a \
                  schedule, keeps the newest N copies, and records every attempt in a \
                  metadata log."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default settings file
    Init,

    /// Show current configuration and paths
    Config,

    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Run the automatic backup scheduler until Ctrl-C
    Run,

    /// Trigger a data sync
    Sync {
        /// Event name passed to the sync trigger
        #[arg(short, long, default_value = "sync_requested")]
        event: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keeper=warn")),
        )
        .init();

    let cli = Cli::parse();
    let paths = KeeperPaths::new()?;

    match cli.command {
        Some(Commands::Init) => {
            let settings = Settings::load_or_create(&paths)?;
            settings.save(&paths)?;
            println!("Initialized keeper at: {}", paths.base_dir().display());
            println!("Settings file: {}", paths.settings_file().display());
            println!();
            println!("Backups are disabled by default. Edit the settings file to enable them.");
        }
        Some(Commands::Config) => {
            let settings = Settings::load_or_create(&paths)?;
            let backup = &settings.backup;
            println!("keeper Configuration");
            println!("====================");
            println!("Config directory: {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Metadata log:     {}", paths.metadata_log().display());
            println!();
            println!("Backup:");
            println!("  Enabled:              {}", backup.enabled);
            println!("  Automatic scheduling: {}", backup.automatic_scheduling_enabled);
            println!("  Strategy:             {}", backup.strategy);
            println!("  Frequency (hours):    {}", backup.frequency_hours);
            println!("  Source:               {}", backup.source_db_path.display());
            println!("  Target directory:     {}", backup.target_directory.display());
            println!("  Retention count:      {}", backup.retention_count);
            println!();
            println!("Sync:");
            println!("  Enabled:              {}", settings.sync.enabled);
        }
        Some(Commands::Backup(cmd)) => {
            let (service, store) = open_service(&paths)?;
            handle_backup_command(&service, &store, cmd).await?;
        }
        Some(Commands::Run) => {
            let (service, _store) = open_service(&paths)?;
            run_scheduler(service).await?;
        }
        Some(Commands::Sync { event }) => {
            let (service, _store) = open_service(&paths)?;
            let event: TriggerEvent = event.parse()?;
            let outcome = service.trigger_sync(event, TriggerPayload::default());
            println!("Sync {}: {}", outcome.status, outcome.message);
        }
        None => {
            println!("keeper - scheduled file backups");
            println!();
            println!("Run 'keeper --help' for usage information.");
            println!("Run 'keeper backup create' to back up now.");
        }
    }

    Ok(())
}

/// Wire the settings file and metadata log into a backup service
fn open_service(paths: &KeeperPaths) -> Result<(Arc<BackupService>, Arc<JsonlMetadataStore>)> {
    let provider = Arc::new(SettingsProvider::load(paths.clone())?);
    let store = Arc::new(JsonlMetadataStore::new(paths.metadata_log()));
    let service = Arc::new(BackupService::new(provider, store.clone())?);
    Ok((service, store))
}
