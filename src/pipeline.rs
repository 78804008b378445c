//! The ingestion run: every configured source, one after another, through
//! fetch → parse → store.
//!
//! Nothing that goes wrong for one source or one record stops the run. A
//! source that cannot be fetched is logged and skipped, an item that fails
//! validation was already dropped by the parser, and a record the store
//! rejects is logged and skipped. The [`IngestReport`] counts all of it.

use crate::error::FetchError;
use crate::fetcher::Fetch;
use crate::models::Source;
use crate::parser::{self, DocumentShape};
use crate::store::{Insertion, NewsStore};
use crate::utils::truncate_for_log;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Counters for one run over all sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub extracted: usize,
    pub dropped: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub store_errors: usize,
}

/// Counters for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub shape: DocumentShape,
    pub extracted: usize,
    pub dropped: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub store_errors: usize,
}

impl IngestReport {
    fn absorb(&mut self, source: &SourceReport) {
        self.sources_ok += 1;
        self.extracted += source.extracted;
        self.dropped += source.dropped;
        self.inserted += source.inserted;
        self.duplicates += source.duplicates;
        self.store_errors += source.store_errors;
    }
}

/// Ingest every source in order.
///
/// # Arguments
///
/// * `fetcher` - Retrieves each source document.
/// * `store` - Receives every valid record.
/// * `sources` - Source URLs exactly as configured.
///
/// # Returns
///
/// Counters for the whole run. A source that fails is counted in
/// `sources_failed` and never stops the sources after it.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn ingest_all<F, S>(fetcher: &F, store: &NewsStore, sources: &[S]) -> IngestReport
where
    F: Fetch,
    S: AsRef<str>,
{
    let t0 = Instant::now();
    let mut report = IngestReport::default();

    for source in sources {
        let source = source.as_ref();
        match ingest_source(fetcher, store, source).await {
            Ok(source_report) => report.absorb(&source_report),
            Err(e) => {
                error!(%source, error = %e, "Skipping source");
                report.sources_failed += 1;
            }
        }
    }

    info!(
        elapsed_ms = t0.elapsed().as_millis() as u64,
        sources_ok = report.sources_ok,
        sources_failed = report.sources_failed,
        extracted = report.extracted,
        dropped = report.dropped,
        inserted = report.inserted,
        duplicates = report.duplicates,
        store_errors = report.store_errors,
        "Ingestion finished"
    );
    report
}

/// Fetch, parse and store one source.
///
/// Only fetching can fail the source as a whole; store failures are counted
/// per record.
#[instrument(level = "info", skip(fetcher, store))]
pub async fn ingest_source<F: Fetch>(
    fetcher: &F,
    store: &NewsStore,
    configured: &str,
) -> Result<SourceReport, FetchError> {
    let source = Source::parse(configured).map_err(|e| FetchError::InvalidUrl {
        url: configured.to_string(),
        source: e,
    })?;

    let doc = fetcher.fetch(&source.url).await?;
    debug!(effective_url = %doc.url, bytes = doc.body.len(), "Parsing document");
    let outcome = parser::parse(&doc, &source);

    let mut report = SourceReport {
        shape: outcome.shape,
        extracted: outcome.records.len(),
        dropped: outcome.dropped,
        inserted: 0,
        duplicates: 0,
        store_errors: 0,
    };

    for record in &outcome.records {
        match store.upsert_ignore(record) {
            Ok(Insertion::Inserted) => report.inserted += 1,
            Ok(Insertion::Duplicate) => report.duplicates += 1,
            Err(e) => {
                warn!(
                    url = %record.url,
                    title = %truncate_for_log(&record.title, 80),
                    error = %e,
                    "Failed to store record"
                );
                report.store_errors += 1;
            }
        }
    }

    info!(
        shape = %report.shape,
        extracted = report.extracted,
        inserted = report.inserted,
        duplicates = report.duplicates,
        "Source ingested"
    );
    Ok(report)
}
