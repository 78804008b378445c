//! # news_ingest
//!
//! Collects news records from RSS/Atom feeds and plain article pages into a
//! deduplicated SQLite archive, and reads them back for downstream analysis.
//!
//! ## Usage
//!
//! ```sh
//! news_ingest ingest -s https://feeds.npr.org/1001/rss.xml
//! news_ingest recent -n 5
//! news_ingest search technology -n 3
//! ```
//!
//! ## Architecture
//!
//! Each configured source goes through the same stages, one source at a time:
//! 1. **Fetching**: one HTTP GET with a fixed timeout ([`fetcher`])
//! 2. **Parsing**: feed items first, `<article>` blocks as fallback ([`parser`])
//! 3. **Storing**: insert-or-ignore keyed by article URL ([`store`])
//!
//! A failure in any stage only costs the source or the record it happened
//! to; the run always goes on to the next one.

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod fetcher;
mod models;
mod outputs;
mod parser;
mod pipeline;
mod store;
mod utils;

use cli::{Cli, Command};
use config::IngestConfig;
use fetcher::HttpFetcher;
use outputs::json;
use store::NewsStore;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    // Logs go to stderr so JSON output on stdout stays clean.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let store = NewsStore::open(&args.db)?;
    debug!(db = ?store.db_path(), "News store ready");

    match args.command {
        Command::Ingest(ingest_args) => {
            let config = IngestConfig::from_args(&ingest_args)?;
            let fetcher = HttpFetcher::new(config.timeout)?;

            let report = pipeline::ingest_all(&fetcher, &store, &config.sources).await;
            info!(
                stored_total = store.count()?,
                new_records = report.inserted,
                failed_sources = report.sources_failed,
                "Ingestion summary"
            );
        }
        Command::Recent { limit, output } => {
            let records = store.recent(limit)?;
            info!(count = records.len(), limit, "Loaded recent records");
            json::write_records(&records, output.as_deref()).await?;
        }
        Command::Search {
            keyword,
            limit,
            output,
        } => {
            let records = store.search(&keyword, limit)?;
            info!(count = records.len(), %keyword, limit, "Searched records");
            json::write_records(&records, output.as_deref()).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, "Execution complete");
    Ok(())
}
