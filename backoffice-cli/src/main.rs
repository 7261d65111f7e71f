mod commands;
mod config;
mod error;
mod paths;

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use backoffice_lib::Backoffice;
use backoffice_lib::cache::DurableStore;
use backoffice_lib::cache::SqliteStore;
use backoffice_lib::listing::ListQuery;
use backoffice_lib::store::RestStore;
use chrono::NaiveDate;
use clap::Parser;
use clap::Subcommand;
use simplelog::ColorChoice;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;

use crate::commands::Output;
use crate::commands::Table;
use crate::config::FileConfig;
use crate::config::Overrides;
use crate::config::Settings;
use crate::error::CliError;

/// Back-office console for the hosted marketplace database.
#[derive(Debug, Parser)]
#[command(name = "backoffice", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Gateway base URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Gateway API key
    #[arg(long, global = true)]
    key: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sort outstanding payments into due tomorrow / due today / overdue
    Triage {
        /// Days before now to include
        #[arg(long, default_value_t = 7)]
        days_back: i64,
        /// Days after now to include
        #[arg(long, default_value_t = 7)]
        days_ahead: i64,
    },
    /// Show the meeting calendar for a week
    Week {
        /// Any day of the week to show (YYYY-MM-DD); defaults to this week
        date: Option<NaiveDate>,
    },
    /// List one page of a table
    List {
        #[arg(value_enum)]
        table: Table,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        size: usize,
        /// Space-separated words; every word must match some searched column
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Print one row as JSON
    Get {
        #[arg(value_enum)]
        table: Table,
        id: String,
    },
    /// Count unresolved claims
    Unresolved {
        /// Keep refreshing every N seconds until Ctrl-C
        #[arg(long)]
        every: Option<u64>,
    },
    /// Print signed URLs for storage paths
    Sign {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Mark a claim as resolved
    Resolve { id: String },
    /// Mark a payment as paid
    MarkPaid { id: String },
    /// Maintain the local totals cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum CacheAction {
    /// Remove expired entries
    Gc,
    /// Remove every entry
    Clear,
}

fn init_logging(cli: &Cli) -> Result<(), CliError> {
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let result = match &cli.log_file {
        Some(path) => {
            let file = File::create(path)?;
            WriteLogger::init(level, Config::default(), file)
        }
        None => TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto),
    };
    result.map_err(|e| CliError::Logger(e.to_string()))
}

async fn open_durable(enabled: bool) -> Option<Arc<dyn DurableStore>> {
    if !enabled {
        return None;
    }
    let path = paths::cache_db()?;
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::warn!("Cannot create cache directory {}: {}", parent.display(), e);
            return None;
        }
    }
    match SqliteStore::open(&path).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            log::warn!("Durable totals disabled, cannot open {}: {}", path.display(), e);
            None
        }
    }
}

fn connect(settings: &Settings) -> Result<RestStore, CliError> {
    let mut builder = RestStore::builder().url(&settings.url).api_key(&settings.api_key);
    if let Some(token) = &settings.access_token {
        builder = builder.access_token(token);
    }
    if let Some(timeout) = settings.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

async fn build_backoffice(cli: &Cli) -> Result<Backoffice, CliError> {
    let file = FileConfig::load(cli.config.as_deref())?;
    let overrides = Overrides {
        url: cli.url.clone(),
        api_key: cli.key.clone(),
    };
    let settings = Settings::resolve(file, overrides, |name| std::env::var(name).ok())?;

    let store = connect(&settings)?;
    let mut builder = Backoffice::builder()
        .store(store.clone())
        .signer(store)
        .cache_config(settings.cache.clone())
        .payment_windows(settings.windows)
        .calendar(settings.calendar);
    if let Some(bucket) = &settings.image_bucket {
        builder = builder.image_bucket(bucket);
    }
    if let Some(durable) = open_durable(settings.durable_counts).await {
        builder = builder.durable(durable);
    }
    Ok(builder.build()?)
}

async fn cache(action: CacheAction) -> Result<(), CliError> {
    let Some(path) = paths::cache_db() else {
        return Err(CliError::Usage("No cache directory on this platform".to_string()));
    };
    if !path.exists() {
        println!("No cache at {}", path.display());
        return Ok(());
    }
    let store = SqliteStore::open(&path).await?;
    match action {
        CacheAction::Gc => {
            let removed = store.gc().await?;
            println!("Removed {} expired entries", removed);
        }
        CacheAction::Clear => {
            store.clear().await?;
            println!("Cleared {}", path.display());
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Command::Cache { action } = cli.command {
        return cache(action).await;
    }

    let backoffice = build_backoffice(&cli).await?;
    let out = Output { json: cli.json };

    match cli.command {
        Command::Triage { days_back, days_ahead } => commands::triage(&backoffice, days_back, days_ahead, out).await,
        Command::Week { date } => commands::week(&backoffice, date, out).await,
        Command::List {
            table,
            page,
            size,
            search,
            status,
        } => {
            let mut query = ListQuery::new(page, size);
            if let Some(search) = search {
                query = query.with_search(search);
            }
            if let Some(status) = status {
                query = query.with_status(status);
            }
            commands::list(&backoffice, table, &query, out).await
        }
        Command::Get { table, id } => commands::get(&backoffice, table, &id).await,
        Command::Unresolved { every } => commands::unresolved(&backoffice, every).await,
        Command::Sign { paths } => commands::sign(&backoffice, &paths).await,
        Command::Resolve { id } => commands::resolve(&backoffice, &id).await,
        Command::MarkPaid { id } => commands::mark_paid(&backoffice, &id).await,
        Command::Cache { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
