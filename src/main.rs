//! Sitekeeper CLI
//!
//! Operator commands over the local site store: sync with the published
//! documents, restore and export backups, write the split publish documents,
//! and inspect or reset local state.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sitekeeper::config::Config;
use sitekeeper::db::{self, SqliteKvStore};
use sitekeeper::errors::AppError;
use sitekeeper::remote::HttpRemote;
use sitekeeper::restore::{RestoreOutcome, RestorePreview};
use sitekeeper::AppState;

type State = AppState<SqliteKvStore, HttpRemote>;

#[derive(Parser)]
#[command(version, about = "Local-first content store for the catalog site builder")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the local store with the published documents
    Sync,

    /// Restore a backup file into the local store
    Restore {
        file: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Write a full backup of the local store
    Export { file: PathBuf },

    /// Write data_core.json, data_about.json and data_products.json into a directory
    Publish { dir: PathBuf },

    /// Show local versions, reconciliation outcome and published file health
    Status,

    /// Reset theme and catalog to the built-in defaults
    Reset,

    /// Delete all local data and flags, then reload from the host
    HardReset {
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing(config: &Config, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn prompt_yes_no(question: &str) -> bool {
    eprint!("{} [y/N] ", question);
    io::stderr().flush().ok();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn confirm_restore(preview: &RestorePreview, assume_yes: bool) -> bool {
    if preview.large_file {
        eprintln!(
            "Large file detected ({:.1} MB).",
            preview.source_bytes as f64 / (1024.0 * 1024.0)
        );
    }
    if assume_yes {
        return true;
    }
    prompt_yes_no(&format!(
        "Found {} products in {} categories (version {}). Restore now?",
        preview.product_count, preview.category_count, preview.version
    ))
}

async fn open_state(config: Arc<Config>) -> Result<State, AppError> {
    let pool = db::init_database(&config.db_path).await?;
    let remote = HttpRemote::new(config.remote_base_url.clone(), config.fetch_timeout)?;
    let store = SqliteKvStore::new(pool.clone());
    let flags = SqliteKvStore::flags(pool);
    Ok(AppState::init(store, flags, remote, config).await)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli, config: Arc<Config>) -> Result<(), AppError> {
    if let Commands::HardReset { yes } = &cli.cmd {
        if !*yes && !prompt_yes_no("Delete ALL local data and reload from the host?") {
            return Ok(());
        }
    }

    let state = open_state(config).await?;

    match cli.cmd {
        Commands::Sync => {
            state.wait_for_background().await;
            print_json(&state.reports().await)?;
        }
        Commands::Restore { file, yes } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let outcome = state
                .restore_backup(
                    &text,
                    |preview| confirm_restore(preview, yes),
                    |progress| eprint!("\rRestoring data... {}%", progress.percent),
                )
                .await;
            eprintln!();
            match outcome? {
                RestoreOutcome::Declined => println!("Restore cancelled"),
                RestoreOutcome::Restored(summary) => print_json(&summary)?,
            }
        }
        Commands::Export { file } => {
            let written = state.export_backup(&file).await?;
            print_json(&written)?;
        }
        Commands::Publish { dir } => {
            let written = state.publish_documents(&dir).await?;
            if written.iter().any(|f| f.oversized) {
                eprintln!("Warning: at least one file is over 20 MB and may be rejected by the host");
            }
            print_json(&written)?;
        }
        Commands::Status => {
            let catalog = state.catalog().await;
            let status = serde_json::json!({
                "reconcile": state.reports().await,
                "products": catalog.products.len(),
                "categories": catalog.categories.len(),
                "catalog_image_bytes": catalog.image_bytes(),
                "theme_image_bytes": state.theme().await.image_bytes(),
                "remote": state.probe_remote().await,
            });
            print_json(&status)?;
        }
        Commands::Reset => {
            state.reset_theme().await?;
            state.reset_catalog().await?;
            state.reload().await;
            println!("Theme and catalog reset to defaults");
        }
        Commands::HardReset { .. } => {
            state.hard_reset().await?;
            println!("Local data cleared");
        }
    }

    state.shutdown().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(&config, cli.json_logs);

    tracing::debug!("Database path: {:?}", config.db_path);
    tracing::debug!("Remote base URL: {}", config.remote_base_url);

    match run(cli, Arc::new(config)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            if let Some(hint) = err.user_hint() {
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}
