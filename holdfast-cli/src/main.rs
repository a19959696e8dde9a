//! Command-line interface over the caching pipeline.
//!
//! Wires the signed API client, the holdings provider, and the two cache
//! tiers together, then exposes fetch / refresh / status / cleanup /
//! compare as subcommands. Provider credentials and TTLs come from the
//! environment (a `.env` file is honored).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use holdfast_cache::{
    BackendError, CacheOrchestrator, FsBackend, LmdbBackend, OrchestratorConfig, PersistentCache,
    StorageBackend,
};
use holdfast_client::{HoldingsApiProvider, SignedApiClient};
use holdfast_core::{CacheSettings, HoldingsSnapshot, ProviderConfig, ProviderError};

#[derive(Parser)]
#[command(
    name = "holdfast",
    version,
    about = "Cached access to quarterly holdings disclosures"
)]
struct Cli {
    /// Cache key for the holdings snapshot
    #[arg(long, default_value = "scion-holdings")]
    key: String,

    /// Filer whose holdings are fetched
    #[arg(long, env = "HOLDFAST_FILER", default_value = "Scion Asset Management")]
    filer: String,

    /// Persistent cache backend
    #[arg(long, value_enum, default_value = "fs")]
    backend: BackendKind,

    /// Override the persistent cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch holdings, serving from cache when fresh
    Fetch {
        /// Emit the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop cached holdings and fetch fresh data
    Refresh {
        /// Emit the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show cache freshness for both tiers
    Status {
        /// Emit the status report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sweep expired entries from both tiers
    Cleanup,
    /// Quarter-over-quarter comparison, printed as raw upstream JSON
    Compare {
        /// Quarters to compare; defaults to latest and previous
        quarters: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
    /// One JSON file per key
    Fs,
    /// LMDB database
    Lmdb,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

struct App {
    orchestrator: Arc<CacheOrchestrator<HoldingsSnapshot>>,
    provider: Arc<HoldingsApiProvider>,
    key: String,
}

impl App {
    fn build(cli: &Cli) -> Result<Self, CliError> {
        let mut settings = CacheSettings::from_env();
        if let Some(dir) = &cli.cache_dir {
            settings = settings.with_cache_dir(dir);
        }

        let backend: Arc<dyn StorageBackend> = match cli.backend {
            BackendKind::Fs => Arc::new(FsBackend::new(&settings.cache_dir)?),
            BackendKind::Lmdb => Arc::new(LmdbBackend::open_default(&settings.cache_dir)?),
        };

        let client = SignedApiClient::new(ProviderConfig::from_env())?;
        let provider = Arc::new(HoldingsApiProvider::new(client, cli.filer.as_str()));

        let orchestrator = Arc::new(CacheOrchestrator::new(
            PersistentCache::new(backend),
            provider.clone(),
            OrchestratorConfig::from_settings(&settings),
        ));

        Ok(Self {
            orchestrator,
            provider,
            key: cli.key.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let app = App::build(&cli)?;
    debug!(key = %app.key, filer = %cli.filer, backend = ?cli.backend, "pipeline assembled");

    match cli.command {
        Command::Fetch { json } => {
            let snapshot = app.orchestrator.get_or_fetch(&app.key).await;
            report_snapshot(snapshot, json)?;
        }
        Command::Refresh { json } => {
            let snapshot = app.orchestrator.force_refresh(&app.key).await;
            report_snapshot(snapshot, json)?;
        }
        Command::Status { json } => {
            let status = app.orchestrator.cache_status(&app.key).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Command::Cleanup => {
            let report = app.orchestrator.cleanup().await;
            println!(
                "removed {} memory and {} persistent entries",
                report.memory_removed, report.persistent_removed
            );
        }
        Command::Compare { quarters } => {
            let comparison = app.provider.fetch_comparison(quarters).await?;
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("holdfast=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn report_snapshot(snapshot: Option<HoldingsSnapshot>, json: bool) -> Result<(), CliError> {
    let Some(snapshot) = snapshot else {
        eprintln!("no holdings data available from any source");
        std::process::exit(1);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

fn print_snapshot(snapshot: &HoldingsSnapshot) {
    println!(
        "{} | {} (reported {})",
        snapshot.filer_name, snapshot.quarter, snapshot.report_date
    );
    println!(
        "{} positions, total value ${:.0}",
        snapshot.total_positions, snapshot.total_value
    );
    for position in &snapshot.positions {
        let change = position
            .change
            .as_ref()
            .map(|c| format!("  [{}]", c.change_type))
            .unwrap_or_default();
        println!(
            "  {:>3}. {:<8} {:<32} {:>6.2}%  ${:.0}{}",
            position.rank,
            position.ticker,
            position.name,
            position.portfolio_percent,
            position.market_value,
            change
        );
    }
}

fn print_status(status: &holdfast_cache::CacheStatus) {
    println!(
        "memory:      {} ({} active / {} total entries)",
        if status.memory_has { "fresh" } else { "empty" },
        status.memory.active_entries,
        status.memory.total_entries
    );
    let persistent = &status.persistent;
    if persistent.exists {
        println!(
            "persistent:  {} (age {}, generation {})",
            if persistent.expired { "expired" } else { "fresh" },
            status.data_age,
            persistent.generation_tag.as_deref().unwrap_or("unknown")
        );
    } else {
        println!("persistent:  empty");
    }
    println!(
        "refresh:     {}",
        if status.should_refresh {
            "recommended, no fresh data in either tier"
        } else {
            "not needed"
        }
    );
}
