use clap::Parser;
use gamesync::adapters::{EspnScoreboard, GammaMarkets, MemoryStore, PostgresStore, SyncStore};
use gamesync::cli::{self, Cli, Commands};
use gamesync::config::AppConfig;
use gamesync::coordination::{GracefulShutdown, RateLimiter, ShutdownSignal};
use gamesync::error::{Result, SyncError};
use gamesync::matching::{TeamAliasDatabase, TeamNameExtractor};
use gamesync::sync::{Collaborators, SyncDriver, SyncOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match &cli.command {
        Commands::Run { dry_run } => {
            init_logging(&config.logging);
            run_loop(config, *dry_run).await?;
        }
        Commands::Once { dry_run } => {
            init_logging(&config.logging);
            run_once(config, *dry_run).await?;
        }
        Commands::Extract { title, sport } => {
            init_logging_simple();
            let aliases = Arc::new(TeamAliasDatabase::from_config(&config.matching)?);
            let extractor = TeamNameExtractor::new(Arc::clone(&aliases));
            print!("{}", cli::describe_extraction(&aliases, &extractor, title, sport.as_deref()));
        }
        Commands::Aliases { sport } => {
            init_logging_simple();
            let aliases = TeamAliasDatabase::from_config(&config.matching)?;
            print!("{}", cli::describe_aliases(&aliases, sport.as_deref()));
        }
        Commands::Runs { limit } => {
            init_logging_simple();
            let store = connect_postgres(&config).await?;
            print!("{}", cli::describe_runs(&store.recent_sync_runs(*limit).await?));
        }
    }

    Ok(())
}

fn load_config(dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    config
        .validate()
        .map_err(|errors| SyncError::InvalidConfig(errors.join("; ")))?;
    Ok(config)
}

async fn connect_postgres(config: &AppConfig) -> Result<PostgresStore> {
    let db = config
        .database
        .as_ref()
        .ok_or_else(|| {
            SyncError::InvalidConfig("database.url is required unless --dry-run is set".to_string())
        })?;
    let store = PostgresStore::new(&db.url, db.max_connections).await?;
    store.migrate().await?;
    Ok(store)
}

async fn build_orchestrator(
    config: &AppConfig,
    dry_run: bool,
    shutdown: Arc<GracefulShutdown>,
) -> Result<SyncOrchestrator> {
    let aliases = Arc::new(TeamAliasDatabase::from_config(&config.matching)?);
    info!(teams = aliases.len(), "Alias table loaded");

    let store: Arc<dyn SyncStore> = if dry_run {
        warn!("Dry run: state is kept in memory and lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(connect_postgres(config).await?)
    };

    let collaborators = Collaborators {
        scores: Arc::new(EspnScoreboard::new(&config.feeds)?),
        markets: Arc::new(GammaMarkets::new(&config.feeds)?),
        store,
    };
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

    let mut orchestrator =
        SyncOrchestrator::new(config.clone(), limiter, aliases, collaborators, shutdown);
    if !dry_run {
        orchestrator.hydrate(chrono::Utc::now()).await?;
    }
    info!(intervals = %cli::describe_intervals(orchestrator.scheduler()), "Poll schedule");
    Ok(orchestrator)
}

async fn run_loop(config: AppConfig, dry_run: bool) -> Result<()> {
    let shutdown = Arc::new(GracefulShutdown::new());
    let orchestrator = build_orchestrator(&config, dry_run, Arc::clone(&shutdown)).await?;
    let driver = SyncDriver::new(
        orchestrator,
        Arc::clone(&shutdown),
        Duration::from_secs(config.sync.tick_secs),
    );

    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        signal_shutdown.request_shutdown(ShutdownSignal::Graceful);
    });

    info!(
        leagues = config.leagues.len(),
        tick_secs = config.sync.tick_secs,
        dry_run,
        "gamesync running. Press Ctrl+C to stop."
    );
    driver.run().await;
    Ok(())
}

async fn run_once(config: AppConfig, dry_run: bool) -> Result<()> {
    let shutdown = Arc::new(GracefulShutdown::new());
    let mut orchestrator = build_orchestrator(&config, dry_run, shutdown).await?;
    let run = orchestrator.run_cycle(chrono::Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}
