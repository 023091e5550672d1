//! Faculty-Harvest main entry point
//!
//! This is the command-line interface for the faculty profile harvester.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use faculty_harvest::config::{load_config_with_hash, Config};
use faculty_harvest::harvest::chromium::ChromiumLauncher;
use faculty_harvest::harvest::{
    build_http_client, harvest_source, BlockDetector, BrowserLauncher, HarvestOutput,
    MarkerBlockDetector, RunState,
};
use faculty_harvest::output::{
    load_statistics, print_run_summary, print_statistics, RunTotals, SourceMetrics,
};
use faculty_harvest::sources::SourceRegistry;
use faculty_harvest::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use faculty_harvest::HarvestError;

/// Faculty-Harvest: a concurrent faculty directory harvester
///
/// Discovers profile pages on department directory sites, fetches them over
/// plain HTTP with a headless-browser fallback, and stores both the raw pages
/// and normalized profile records.
#[derive(Parser, Debug)]
#[command(name = "faculty-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent faculty directory harvester", long_about = None)]
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

    /// Harvest only this source (repeatable)
    #[arg(long = "source", value_name = "ID")]
    sources: Vec<String>,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let registry = SourceRegistry::from_config(&config.sources)?;
    let targets = select_sources(&config, &registry, &cli.sources)?;

    if cli.dry_run {
        handle_dry_run(&config, &registry, &targets);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(&config, &config_hash, &registry, &targets).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("faculty_harvest=info,warn"),
            1 => EnvFilter::new("faculty_harvest=debug,info"),
            2 => EnvFilter::new("faculty_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves which sources this invocation harvests
///
/// Sources named on the command line win. Otherwise every enabled configured
/// source is used, or every built-in source when none are configured.
fn select_sources(
    config: &Config,
    registry: &SourceRegistry,
    requested: &[String],
) -> anyhow::Result<Vec<String>> {
    let targets: Vec<String> = if !requested.is_empty() {
        requested.to_vec()
    } else if config.sources.is_empty() {
        registry.ids().map(str::to_string).collect()
    } else {
        config
            .sources
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.id.clone())
            .collect()
    };

    for id in &targets {
        if registry.get(id).is_none() {
            return Err(HarvestError::UnknownSource(id.clone()).into());
        }
    }
    if targets.is_empty() {
        bail!("No sources selected: every configured source is disabled");
    }
    Ok(targets)
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config, registry: &SourceRegistry, targets: &[String]) {
    println!("=== Faculty-Harvest Dry Run ===\n");

    println!("Harvester Configuration:");
    println!(
        "  Light tier: {} concurrent, {}s timeout",
        config.harvester.light_concurrency, config.harvester.light_timeout_secs
    );
    println!(
        "  Heavy tier: {} concurrent, {}s navigation timeout, {}s readiness timeout",
        config.harvester.heavy_concurrency,
        config.harvester.heavy_timeout_secs,
        config.harvester.readiness_timeout_secs
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.value);

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!(
        "  Executable: {}",
        config.browser.executable.as_deref().unwrap_or("(auto-detect)")
    );

    println!(
        "\nBlock Markers ({}):",
        config.block_detection.markers.len()
    );
    for marker in &config.block_detection.markers {
        println!("  - {}", marker);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSources ({}):", targets.len());
    for id in targets {
        if let Some(source) = registry.get(id) {
            let readiness = readiness_override(config, id)
                .or_else(|| source.readiness_selector().map(str::to_string))
                .unwrap_or_else(|| "(none)".to_string());
            println!(
                "  - {} ({}), readiness selector: {}",
                id,
                source.department(),
                readiness
            );
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} sources", targets.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
///
/// Sources are harvested one after another, each with its own fresh
/// [`RunState`], and share one run id.
async fn handle_harvest(
    config: &Config,
    config_hash: &str,
    registry: &SourceRegistry,
    targets: &[String],
) -> anyhow::Result<()> {
    let run_id = Uuid::new_v4().to_string();
    tracing::info!("Starting harvest run {} over {} sources", run_id, targets.len());

    let mut storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    storage.create_run(&run_id, config_hash)?;

    let client = build_http_client(&config.user_agent)?;
    let detector: Arc<dyn BlockDetector> =
        Arc::new(MarkerBlockDetector::new(&config.block_detection.markers));
    let launcher: Arc<dyn BrowserLauncher> = Arc::new(ChromiumLauncher::new(
        config.browser.clone(),
        config.harvester.heavy_timeout(),
    ));

    let mut harvested = Vec::new();
    let mut failed_sources = Vec::new();

    for id in targets {
        let Some(source) = registry.get(id) else {
            continue;
        };
        let state = Arc::new(RunState::new(&config.harvester, launcher.clone()));

        let result = harvest_source(
            source,
            state,
            client.clone(),
            detector.clone(),
            readiness_override(config, id),
            &run_id,
        )
        .await;

        let output = match result {
            Ok(output) => output,
            Err(HarvestError::RendererUnavailable {
                source_id,
                reason,
                partial,
            }) => {
                tracing::error!(
                    "Browser unavailable for '{}', keeping light-tier results: {}",
                    source_id,
                    reason
                );
                failed_sources.push((source_id, format!("renderer unavailable: {}", reason)));
                *partial
            }
            Err(e) => {
                tracing::error!("Source '{}' failed: {}", id, e);
                failed_sources.push((id.clone(), e.to_string()));
                continue;
            }
        };

        harvested.push(persist_output(&mut storage, &run_id, id, &output)?);
    }

    let totals = RunTotals::from_sources(&harvested);
    let status = if harvested.is_empty() {
        RunStatus::Failed
    } else {
        RunStatus::Completed
    };
    storage.finish_run(&run_id, status, &totals)?;

    print_run_summary(&run_id, &harvested, &failed_sources);

    if harvested.is_empty() {
        bail!("Harvest run {} produced no output", run_id);
    }
    Ok(())
}

/// Writes one source's output and metrics to storage
fn persist_output(
    storage: &mut SqliteStorage,
    run_id: &str,
    source_id: &str,
    output: &HarvestOutput,
) -> anyhow::Result<SourceMetrics> {
    let archived = storage.insert_raw_pages(&output.raw_captures)?;
    let upserted = storage.upsert_records(&output.records, Utc::now())?;

    let metrics = SourceMetrics::from_output(source_id, output);
    storage.insert_source_metrics(run_id, &metrics)?;

    tracing::info!(
        "Stored '{}': {} raw pages, {} records",
        source_id,
        archived,
        upserted
    );
    Ok(metrics)
}

fn readiness_override(config: &Config, source_id: &str) -> Option<String> {
    config
        .sources
        .iter()
        .find(|entry| entry.id == source_id)
        .and_then(|entry| entry.readiness_selector.clone())
}
