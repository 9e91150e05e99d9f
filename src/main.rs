//! # Job Harvester CLI (`jobscan`)
//!
//! Meant to be invoked on a schedule (cron, systemd timer, CI cron job).
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jobscan run` | Search every site for every category and append new listings |
//! | `jobscan queries` | Print the queries a run would issue today |
//! | `jobscan sites` | List configured sites and their platform labels |
//! | `jobscan check` | Validate configuration and secrets |
//!
//! ## Examples
//!
//! ```bash
//! # Preview what today's run would add to the EM tab
//! jobscan run --category EM --dry-run --config ./config/jobscan.toml
//!
//! # Nightly harvest
//! 0 6 * * * jobscan run --config /etc/jobscan.toml
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use job_harvester::config::{self, Config, Secrets};
use job_harvester::credentials::{ServiceAccountTokenSource, SHEETS_SCOPE};
use job_harvester::normalize::platform_label;
use job_harvester::pipeline::{planned_queries, Harvester, RunOptions};
use job_harvester::search::SerperProvider;
use job_harvester::sheets::SheetsStore;

/// Job Harvester: search ATS boards and append new listings to a spreadsheet.
///
/// Secrets are read from the environment (or a `.env` file):
/// `SERPER_API_KEY`, `SPREADSHEET_ID`, and either `GOOGLE_CREDENTIALS_JSON`
/// or `GOOGLE_APPLICATION_CREDENTIALS`.
#[derive(Parser)]
#[command(name = "jobscan", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/jobscan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search, dedup, and append new listings.
    ///
    /// Each category is flushed to its own tab. A failure writing one tab
    /// does not stop the others; the command exits non-zero if any failed.
    Run {
        /// Only process this category tab (e.g. `EM`).
        #[arg(long)]
        category: Option<String>,

        /// Count new listings without writing them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print every query a run would issue today.
    Queries,

    /// List configured sites with their platform labels.
    Sites,

    /// Validate configuration and secrets without searching.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let today = chrono::Local::now().date_naive();

    match cli.command {
        Commands::Run { category, dry_run } => {
            let harvester = build_harvester(cfg)?;
            let summary = harvester
                .run(today, &RunOptions { category, dry_run })
                .await?;

            let failed = summary.failed_categories();
            if !failed.is_empty() {
                bail!("failed to update: {}", failed.join(", "));
            }
            println!("ok ({} new jobs)", summary.total_appended());
        }
        Commands::Queries => {
            let cutoff = cfg.search.recency.resolve(today);
            println!("# cutoff {} ({})", cutoff, cfg.search.recency);
            for (tab, query) in planned_queries(&cfg, today) {
                println!("{:<8} {}", tab, query);
            }
        }
        Commands::Sites => {
            println!("{:<28} PLATFORM", "SITE");
            for site in &cfg.sites {
                println!("{:<28} {}", site, platform_label(site));
            }
        }
        Commands::Check => {
            let secrets = Secrets::from_env()?;
            let key = secrets.credentials.load()?;
            let client = reqwest::Client::new();
            let _ = ServiceAccountTokenSource::new(client, key.clone(), SHEETS_SCOPE)?;

            let (sites, categories) = (cfg.sites.len(), cfg.categories.len());
            let source = secrets.credentials.describe();
            println!("config:      {} sites, {} categories", sites, categories);
            println!("credentials: {} ({})", source, key.client_email);
            println!("spreadsheet: {}", secrets.spreadsheet_id);
            println!("ok");
        }
    }

    Ok(())
}

/// Wire the Serper provider and Sheets store from config and environment.
///
/// Fails before any network call if a secret is missing or the key is invalid.
fn build_harvester(cfg: Config) -> Result<Harvester> {
    let secrets = Secrets::from_env()?;
    let key = secrets.credentials.load()?;
    let source = secrets.credentials.describe();
    tracing::info!(credentials = %source, "loaded service account key");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.search.timeout_secs))
        .build()?;
    let tokens = ServiceAccountTokenSource::new(client.clone(), key, SHEETS_SCOPE)?;
    let store = SheetsStore::new(
        client.clone(),
        &cfg.store.base_url,
        &secrets.spreadsheet_id,
        Box::new(tokens),
    );
    let provider = SerperProvider::with_client(client, secrets.serper_api_key, &cfg.search);

    Ok(Harvester::new(cfg, Arc::new(provider), Arc::new(store)))
}
