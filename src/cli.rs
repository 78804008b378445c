//! Command-line interface definitions.
//!
//! All options can also be set through environment variables where noted.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for `news_ingest`.
///
/// # Examples
///
/// ```sh
/// # Ingest the default feeds into ./news.db
/// news_ingest ingest
///
/// # Ingest two specific sources with a 5 second timeout
/// news_ingest ingest -s https://feeds.npr.org/1001/rss.xml -s https://example.org/ --timeout-secs 5
///
/// # Read back what was stored
/// news_ingest recent -n 10
/// news_ingest search health --output health.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path of the SQLite database
    #[arg(long, env = "NEWS_DB", default_value = "news.db", global = true)]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch every source and store records not seen before
    Ingest(IngestArgs),

    /// Print the most recently published records as JSON
    Recent {
        /// Number of records
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,

        /// Write JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search titles and summaries (case-insensitive) and print matches as JSON
    Search {
        /// Text to look for
        keyword: String,

        /// Maximum number of matches
        #[arg(short = 'n', long, default_value_t = 3)]
        limit: usize,

        /// Write JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Source URL to ingest; repeat for several. Takes precedence over --sources-file
    #[arg(short, long = "source")]
    pub sources: Vec<String>,

    /// YAML file with a `sources:` list
    #[arg(short = 'f', long, env = "NEWS_SOURCES_FILE")]
    pub sources_file: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(
        long,
        env = "NEWS_FETCH_TIMEOUT_SECS",
        default_value_t = crate::fetcher::DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,
}
