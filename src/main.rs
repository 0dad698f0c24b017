//! Forum-Harvest main entry point
//!
//! This is the command-line interface for the Forum-Harvest record harvester.

use clap::Parser;
use forum_harvest::config::{load_config_with_hash, Config, StoreConfig};
use forum_harvest::crawler::{Coordinator, ShutdownSignal};
use forum_harvest::storage::open_store;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Forum-Harvest: an incremental forum record harvester
///
/// Forum-Harvest discovers the categories of a forum, walks their thread
/// listings and stores the main post of every thread it has not seen yet.
#[derive(Parser, Debug)]
#[command(name = "forum-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental forum record harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Clear stored records and seen ids before harvesting
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the record store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Also append log output to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence when set. With `log_file`, every event is
/// written to stdout and appended to the file.
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> io::Result<()> {
    let default = if quiet {
        // Only show errors
        "error"
    } else {
        match verbose {
            0 => "forum_harvest=info,warn",
            1 => "forum_harvest=debug,info",
            2 => "forum_harvest=trace,debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Opens `path` for appending, creating missing parent directories
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) {
    println!("=== Forum-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Name: {}", config.site.name);
    println!("  URL: {}", config.site.url);

    println!("\nCrawler Configuration:");
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!("  Requests per second: {}", config.crawler.requests_per_second);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Page segment: {}", config.crawler.page_segment);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Initial delay: {}ms", config.retry.initial_delay_ms);
    println!("  Backoff: x{}", config.retry.backoff);

    println!("\nSelectors:");
    println!("  Category: {}", config.selectors.category.join(" | "));
    println!("  Thread: {}", config.selectors.thread.join(" | "));
    println!("  Title: {}", config.selectors.title.join(" | "));
    println!("  Body: {}", config.selectors.body.join(" | "));
    println!("  Timestamp: {}", config.selectors.timestamp.join(" | "));

    println!(
        "\nExcluded Categories ({}):",
        config.crawler.excluded_categories.len()
    );
    for pattern in &config.crawler.excluded_categories {
        println!("  - {}", pattern);
    }

    if !config.filter.disallowed_scripts.is_empty() {
        println!(
            "\nDisallowed scripts: {}",
            config.filter.disallowed_scripts.join(", ")
        );
    }

    println!("\nStore:");
    println!("  Backend: {}", config.store.backend);
    println!("  Data dir: {}", config.store.data_dir);
    if config.store.backend == "sqlite" {
        println!(
            "  Database: {}",
            StoreConfig::file_name(&config.store.database_file, &config.site.name)
        );
    } else {
        println!(
            "  Records: {}",
            StoreConfig::file_name(&config.store.records_file, &config.site.name)
        );
        println!(
            "  Seen ids: {}",
            StoreConfig::file_name(&config.store.seen_ids_file, &config.site.name)
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the record store
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use forum_harvest::output::{load_statistics, print_statistics};

    let store = open_store(config)?;
    let stats = load_statistics(store.as_ref())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = ShutdownSignal::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            on_signal.trigger();
        }
    });

    tracing::info!(
        "Harvesting {} ({}) into the {} store",
        config.site.name,
        config.site.url,
        config.store.backend
    );

    let mut coordinator = Coordinator::new(config, shutdown)?;
    if fresh {
        tracing::info!("Starting fresh harvest (clearing previous records)");
        coordinator.clear_store()?;
    }

    match coordinator.run().await {
        Ok(stats) if stats.interrupted => {
            tracing::warn!(
                "Harvest interrupted after saving {} records",
                stats.records_saved
            );
            Ok(())
        }
        Ok(stats) => {
            tracing::info!(
                "Harvest completed successfully: {} new records",
                stats.records_saved
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_file_creates_parents_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("harvest.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_log_file_flag() {
        let cli = Cli::parse_from(["forum-harvest", "harvest.toml", "--log-file", "out/harvest.log"]);
        assert_eq!(cli.log_file, Some(PathBuf::from("out/harvest.log")));

        let cli = Cli::parse_from(["forum-harvest", "harvest.toml"]);
        assert_eq!(cli.log_file, None);
    }
}
