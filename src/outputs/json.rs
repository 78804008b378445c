//! JSON output of stored records.
//!
//! Records are written as a pretty-printed array, newest first as returned by
//! the store. Each element carries `title`, `url`, `summary`,
//! `published_at` (RFC 3339) and `source`.

use crate::models::ArticleRecord;
use crate::utils::ensure_parent_dir;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// Serialize `records` as a pretty-printed JSON array.
pub fn render_records(records: &[ArticleRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Write `records` to `path`, or to stdout when no path is given.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub async fn write_records(
    records: &[ArticleRecord],
    path: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let mut json = render_records(records)?;
    json.push('\n');

    match path {
        Some(path) => {
            ensure_parent_dir(path)?;
            fs::write(path, json).await?;
            info!(path = %path.display(), "Wrote JSON records");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(json.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
