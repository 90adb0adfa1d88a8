//! Catalog mirror CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use catalog_mirror::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, UpdateRequest},
    services::{AcceptAll, HttpReader, RecordValidator, RemoteReader, StacItemValidator},
    storage::{StorageGateway, UriStorage},
};
use clap::{Parser, Subcommand};

/// mirror - STAC API to static catalog utility
#[derive(Parser, Debug)]
#[command(
    name = "mirror",
    version,
    about = "Mirror a STAC search API into a static catalog"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "mirror.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Root API URL to copy
    #[arg(long, env = "STAC_API_URL", global = true)]
    url: Option<String>,

    /// Page limit (overrides harvest.page_limit)
    #[arg(long, global = true)]
    limit: Option<u32>,

    /// Maximum concurrent requests (overrides harvest.max_concurrent)
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new catalog from the API's providers and collections
    Create {
        /// Directory or s3:// prefix to save under
        #[arg(long, default_value = ".")]
        path: String,
    },

    /// Update one collection's items from the API
    Update {
        /// Root catalog.json of the existing mirror
        catalog: String,

        /// Provider to update
        provider: String,

        /// Collection to update
        collection: String,

        /// Datetime range (start/end, end may be "now")
        #[arg(long)]
        datetime: Option<String>,

        /// Item layout template (default from config)
        #[arg(long)]
        item_template: Option<String>,

        /// Split the datetime range into this many sequential batches
        #[arg(long, default_value_t = 1)]
        batches: usize,
    },
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

    log::info!("Catalog mirror starting...");

    // Load configuration, then apply command-line overrides
    let mut config = Config::load_or_default(&cli.config);
    if let Some(limit) = cli.limit {
        config.harvest.page_limit = limit;
    }
    if let Some(max_concurrent) = cli.max_concurrent {
        config.harvest.max_concurrent = max_concurrent;
    }
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    let api_url = cli
        .url
        .ok_or_else(|| AppError::config("No API URL: pass --url or set STAC_API_URL"))?;
    let reader: Arc<dyn RemoteReader> = Arc::new(HttpReader::from_config(&config.harvest)?);
    let storage: Arc<dyn StorageGateway> = Arc::new(UriStorage::from_env().await?);

    match cli.command {
        Command::Create { path } => {
            let summary = pipeline::run_create(&config, reader, storage, &api_url, &path).await?;

            log::info!(
                "Created {} with {} providers and {} collections ({} items available)",
                summary.root_uri,
                summary.providers,
                summary.collections,
                summary.items_found
            );
            log::info!("{} documents written", summary.documents_written);
        }

        Command::Update {
            catalog,
            provider,
            collection,
            datetime,
            item_template,
            batches,
        } => {
            let request = UpdateRequest {
                datetime,
                item_template,
                batches,
                ..UpdateRequest::new(catalog, &api_url, provider, collection)
            };
            let validator: Box<dyn RecordValidator> = if config.harvest.validate_records {
                Box::new(StacItemValidator)
            } else {
                Box::new(AcceptAll)
            };

            let summary =
                pipeline::run_update(&config, reader, storage, validator.as_ref(), &request)
                    .await?;

            log::info!(
                "Updated {}: {} fetched, {} rejected, {} new items",
                summary.collection_uri,
                summary.records_fetched,
                summary.records_rejected,
                summary.leaves_inserted
            );
            log::info!(
                "{} subcatalogs created, {} pruned, {} documents written",
                summary.branches_created,
                summary.branches_pruned,
                summary.documents_written
            );
        }
    }

    log::info!("Done!");
    Ok(())
}
