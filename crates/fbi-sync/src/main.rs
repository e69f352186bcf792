//! # fbi-sync
//!
//! Keeps a file metadata index in sync with file-change notifications.
//!
//! Each notification says a file was deposited or removed. Deposits are
//! indexed (either by scanning the file or straight from the message),
//! removals are deleted from the index.
//!
//! ## Commands
//!
//! - `fbi-sync consume` - Consume notifications from a file or stdin
//! - `fbi-sync config show|init|path` - Inspect configuration
//!
//! ## Examples
//!
//! ```bash
//! # Replay a dump of notifications against the configured index
//! fbi-sync consume --input events.jsonl
//!
//! # Index from the messages alone, without touching the files
//! tail -F /var/log/deposit.log | fbi-sync consume --fast
//!
//! # See what would happen without an index
//! fbi-sync consume --input events.jsonl --dry-run
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fbi_core::{BulkIndex, IdentityResolver, UpdateHandler};
use fbi_extract::ExtractorRegistry;
use fbi_index::{
    ConsumerStats, FastUpdateHandler, LineSource, PasswdResolver, PathFilter, QueueConsumer,
    SpotMapping, StaticResolver, ThoroughUpdateHandler,
};
use fbi_store::{ElasticsearchIndex, MemoryIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::{Config, HandlerKind};

#[derive(Parser)]
#[command(name = "fbi-sync")]
#[command(about = "Keep a file metadata index in sync with file-change notifications")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/fbi-sync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume change notifications, one per line
    Consume {
        /// Read notifications from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Use the fast handler regardless of configuration
        #[arg(long)]
        fast: bool,

        /// Write to an in-memory index instead of Elasticsearch
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(Some(path.clone()))
            .context(format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

/// Build the spot mapping from inline entries and the optional spot file.
async fn load_spots(config: &Config) -> Result<SpotMapping> {
    let mut spots = match &config.indexer.spots_file {
        Some(path) => SpotMapping::from_file(path)
            .await
            .with_context(|| format!("Failed to read spot file {}", path.display()))?,
        None => SpotMapping::new(),
    };
    for entry in &config.spots {
        spots.insert(&entry.path, entry.name.clone());
    }
    Ok(spots)
}

/// Load the passwd/group resolver, or fall back to numeric owners.
async fn load_identity(config: &Config) -> Arc<dyn IdentityResolver> {
    let identity = &config.identity;
    match PasswdResolver::from_files(&identity.passwd_file, &identity.group_file).await {
        Ok(resolver) => {
            info!(
                "Loaded {} users and {} groups",
                resolver.user_count(),
                resolver.group_count()
            );
            Arc::new(resolver)
        }
        Err(e) => {
            warn!("Owner names unavailable, indexing numeric ids: {}", e);
            Arc::new(StaticResolver::new())
        }
    }
}

async fn create_handler(
    kind: HandlerKind,
    config: &Config,
    index: Arc<dyn BulkIndex>,
) -> Result<Box<dyn UpdateHandler>> {
    match kind {
        HandlerKind::Fast => Ok(Box::new(FastUpdateHandler::new(index))),
        HandlerKind::Thorough => {
            let extractors =
                ExtractorRegistry::with_defaults().context("Failed to register extractors")?;
            info!("Extractors: {}", extractors.names().join(", "));

            let spots = load_spots(config).await?;
            let identity = load_identity(config).await;

            Ok(Box::new(ThoroughUpdateHandler::new(
                index,
                Arc::new(extractors),
                identity,
                Arc::new(spots),
                config.indexer.thorough(),
            )))
        }
    }
}

fn print_stats(stats: &ConsumerStats, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(stats).context("Failed to serialize stats")?
            );
        }
        OutputFormat::Text => {
            println!("Processed: {}", stats.processed);
            println!("Filtered:  {}", stats.filtered);
            println!("Ignored:   {}", stats.ignored);
            println!("Malformed: {}", stats.malformed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config
            .logging
            .level
            .parse()
            .with_context(|| format!("Invalid log level {:?}", config.logging.level))?
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Consume {
            input,
            fast,
            dry_run,
        } => {
            let memory = dry_run.then(|| Arc::new(MemoryIndex::new()));
            let index: Arc<dyn BulkIndex> = match &memory {
                Some(memory) => {
                    info!("Dry run: writing to an in-memory index");
                    memory.clone() as Arc<dyn BulkIndex>
                }
                None => Arc::new(
                    ElasticsearchIndex::new(config.elasticsearch.client_config())
                        .context("Failed to create Elasticsearch client")?,
                ),
            };

            let kind = if fast {
                HandlerKind::Fast
            } else {
                config.indexer.handler
            };
            let handler = create_handler(kind, &config, index).await?;
            let filter = PathFilter::from_config(&config.indexer.path_filter)
                .context("Invalid path filter")?;
            let mut consumer = QueueConsumer::new(filter, handler);

            let stats = match input {
                Some(path) => {
                    info!("Reading notifications from {:?}", path);
                    let mut source = LineSource::open(&path)
                        .await
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    consumer.run(&mut source).await?
                }
                None => {
                    info!("Reading notifications from stdin");
                    let mut source = LineSource::stdin();
                    consumer.run(&mut source).await?
                }
            };

            if let Some(memory) = memory {
                info!(
                    "Dry run finished: {} documents in the in-memory index",
                    memory.len().await
                );
            }
            print_stats(&stats, cli.format)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}
