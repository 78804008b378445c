//! Turning a fetched document into article records.
//!
//! Two shapes are recognized, tried in this order:
//!
//! 1. **Feed**: RSS `<item>` or Atom `<entry>` elements ([`feed`]).
//! 2. **Page**: HTML `<article>` blocks ([`page`]), only when the feed pass
//!    produced no record at all.
//!
//! Every candidate is validated on its own through
//! [`ArticleRecord::from_draft`]. A candidate that fails is logged and
//! dropped; the rest of the batch is unaffected.

pub mod feed;
pub mod page;

use crate::fetcher::RawDocument;
use crate::models::{ArticleRecord, RecordDraft, Source};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Which extraction path produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    Feed,
    Page,
    /// Neither path yielded a record.
    Unrecognized,
}

impl fmt::Display for DocumentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentShape::Feed => "feed",
            DocumentShape::Page => "page",
            DocumentShape::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

/// Records extracted from one document.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub shape: DocumentShape,
    /// Valid records in document order.
    pub records: Vec<ArticleRecord>,
    /// Candidates that failed validation.
    pub dropped: usize,
}

/// Extract article records from a fetched document.
///
/// # Arguments
///
/// * `doc` - The fetched document; only its body is parsed.
/// * `source` - The configured source the document was fetched for.
///
/// # Returns
///
/// A [`ParseOutcome`] with the valid records in document order and the
/// number of candidates that were dropped. Records without a usable date
/// are stamped with the current time.
pub fn parse(doc: &RawDocument, source: &Source) -> ParseOutcome {
    parse_at(doc, source, Utc::now())
}

/// [`parse`] with an explicit ingestion time.
#[instrument(level = "info", skip_all, fields(source = %source.configured))]
pub fn parse_at(doc: &RawDocument, source: &Source, ingested_at: DateTime<Utc>) -> ParseOutcome {
    let scan = feed::scan(&doc.body);
    if let Some(e) = &scan.error {
        debug!(error = %e, items = scan.drafts.len(), "Document is not well-formed XML past this point");
    }

    let (records, invalid) = build_records(scan.drafts, source, ingested_at);
    let feed_dropped = scan.dropped + invalid;
    if !records.is_empty() {
        info!(count = records.len(), dropped = feed_dropped, "Parsed feed items");
        return ParseOutcome {
            shape: DocumentShape::Feed,
            records,
            dropped: feed_dropped,
        };
    }

    let drafts = match page::scan(&doc.body) {
        Ok(drafts) => drafts,
        Err(e) => {
            warn!(error = %e, "Page extraction unavailable");
            Vec::new()
        }
    };
    let (records, page_dropped) = build_records(drafts, source, ingested_at);
    let dropped = feed_dropped + page_dropped;

    let shape = if records.is_empty() {
        warn!(
            content_type = doc.content_type.as_deref().unwrap_or("-"),
            "No feed items or articles found"
        );
        DocumentShape::Unrecognized
    } else {
        info!(count = records.len(), dropped, "Parsed page articles");
        DocumentShape::Page
    };

    ParseOutcome {
        shape,
        records,
        dropped,
    }
}

/// Validate each draft independently, keeping the successes.
fn build_records(
    drafts: Vec<RecordDraft>,
    source: &Source,
    ingested_at: DateTime<Utc>,
) -> (Vec<ArticleRecord>, usize) {
    let mut records = Vec::with_capacity(drafts.len());
    let mut dropped = 0;

    for (index, draft) in drafts.into_iter().enumerate() {
        match ArticleRecord::from_draft(draft, source, ingested_at) {
            Ok(built) => {
                for note in &built.substitutions {
                    debug!(index, url = %built.record.url, %note, "Substituted field");
                }
                records.push(built.record);
            }
            Err(e) => {
                warn!(index, error = %e, "Skipping item");
                dropped += 1;
            }
        }
    }

    (records, dropped)
}
