//! stopsync CLI
//!
//! Synchronizes the local place catalog against the Arriva Slovenia timetable
//! service. Safe to interrupt and re-run: finished stops are committed and
//! become cache hits on the next invocation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stopsync::{
    error::Result,
    models::Config,
    pipeline,
    services::ApiClient,
    storage::{LocationStore, PlaceStore},
};

/// stopsync - Transit Stop Location Synchronizer
#[derive(Parser, Debug)]
#[command(name = "stopsync", version, about = "Arriva Slovenia stop catalog synchronizer")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "stopsync.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full synchronization: authenticate, fetch, geocode, persist
    Sync,

    /// Force a credential refresh from the landing page
    Refresh,

    /// Validate the configuration file
    Validate,

    /// Show catalog and cache statistics
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("stopsync starting...");

    let config = Config::load_or_default(&cli.config);
    let config = Arc::new(config);

    match cli.command {
        Command::Sync => {
            config.validate()?;

            let interrupt = pipeline::interrupt_flag();
            let outcome = pipeline::run_sync(Arc::clone(&config), interrupt).await?;

            if outcome.interrupted {
                log::info!("Stopped early; finished stops are committed and will be cache hits next run");
            }
        }

        Command::Refresh => {
            config.validate()?;

            let mut client = ApiClient::new(Arc::clone(&config))?;
            client.refresh().await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (endpoints, retry budgets, and storage paths)");
        }

        Command::Info => {
            log::info!("Data directory: {}", config.storage.data_dir.display());

            let places_path = config.storage.places_path();
            if places_path.exists() {
                let places = PlaceStore::open(&places_path)?;
                log::info!(
                    "Places: {} total, {} with coordinates",
                    places.count()?,
                    places.count_with_coords()?
                );
            } else {
                log::info!("No place catalog yet. Run 'sync' first.");
            }

            let locations_path = config.storage.locations_path();
            if locations_path.exists() {
                let locations = LocationStore::open(&locations_path)?;
                log::info!(
                    "Geocode cache: {} entries, {} tombstones",
                    locations.count()?,
                    locations.count_tombstones()?
                );
            } else {
                log::info!("No geocode cache yet.");
            }

            let credentials = config.storage.credentials_path();
            log::info!(
                "Credentials: {}",
                if credentials.exists() { "cached" } else { "not cached" }
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
