//! Data models for extracted news records.
//!
//! - [`RecordDraft`]: what a parser managed to pull out of one candidate item,
//!   every field optional and still raw.
//! - [`ArticleRecord`]: the validated record that gets stored, built from a
//!   draft by [`ArticleRecord::from_draft`].
//! - [`Substitution`]: a note for each field that had to be defaulted or
//!   rewritten on the way.

use crate::error::ExtractionError;
use crate::utils::{strip_html, truncate_summary};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Title used when a candidate has none.
pub const NO_TITLE: &str = "No Title";

/// Summary used when a candidate has no description.
pub const NO_SUMMARY: &str = "No Summary";

/// A validated news record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Display title, never empty.
    pub title: String,
    /// Absolute http(s) URL of the article; unique in the store.
    pub url: Url,
    /// Plain-text summary, at most 500 characters plus an ellipsis.
    pub summary: String,
    /// Publication time, or ingestion time when the source gave none.
    pub published_at: DateTime<Utc>,
    /// The configured source URL the record was extracted from.
    pub source: String,
}

/// A configured source: the text exactly as configured, and the parsed URL
/// that relative links resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub configured: String,
    pub url: Url,
}

impl Source {
    pub fn parse(configured: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(configured)?,
            configured: configured.to_string(),
        })
    }
}

/// How a raw timestamp string is expected to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// RSS `pubDate`, e.g. `Tue, 10 Jun 2003 04:00:00 GMT`.
    Rfc2822,
    /// HTML `time[datetime]` and Atom dates, e.g. `2024-05-01T10:00:00Z`.
    Iso8601,
}

/// A timestamp exactly as found in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTimestamp {
    pub text: String,
    pub format: TimestampFormat,
}

/// Raw fields of one candidate item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published: Option<RawTimestamp>,
}

/// A field-level rewrite applied while validating a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    MissingTitle,
    MissingLink,
    MissingSummary,
    MissingTimestamp,
    UnparseableTimestamp(String),
    SummaryTruncated { chars: usize },
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substitution::MissingTitle => write!(f, "title missing, using {NO_TITLE:?}"),
            Substitution::MissingLink => write!(f, "link missing, using source URL"),
            Substitution::MissingSummary => write!(f, "description missing, using {NO_SUMMARY:?}"),
            Substitution::MissingTimestamp => write!(f, "publish date missing, using ingestion time"),
            Substitution::UnparseableTimestamp(raw) => {
                write!(f, "publish date {raw:?} unparseable, using ingestion time")
            }
            Substitution::SummaryTruncated { chars } => {
                write!(f, "summary of {chars} chars truncated")
            }
        }
    }
}

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRecord {
    pub record: ArticleRecord,
    pub substitutions: Vec<Substitution>,
}

impl ArticleRecord {
    /// Validate a draft into a record, applying the default for every
    /// missing or unusable field.
    ///
    /// Only the link can make a draft fail: a link that is present but does
    /// not resolve to an absolute http(s) URL yields an [`ExtractionError`].
    ///
    /// # Arguments
    ///
    /// * `draft` - Raw fields of one candidate item.
    /// * `source` - Where the item came from. Relative links resolve against
    ///   its URL, a missing link becomes that URL, and the record keeps the
    ///   configured text as its `source`.
    /// * `ingested_at` - Timestamp used when the draft has no usable date.
    ///
    /// # Returns
    ///
    /// The record plus one [`Substitution`] per field that was defaulted or
    /// rewritten.
    pub fn from_draft(
        draft: RecordDraft,
        source: &Source,
        ingested_at: DateTime<Utc>,
    ) -> Result<BuiltRecord, ExtractionError> {
        let mut substitutions = Vec::new();

        let title = match draft.title.as_deref().map(strip_html) {
            Some(t) if !t.is_empty() => t,
            _ => {
                substitutions.push(Substitution::MissingTitle);
                NO_TITLE.to_string()
            }
        };

        let url = match draft.link.as_deref().map(str::trim) {
            Some(link) if !link.is_empty() => resolve_link(&source.url, link)?,
            _ => {
                substitutions.push(Substitution::MissingLink);
                source.url.clone()
            }
        };

        let summary = match draft.description.as_deref().map(strip_html) {
            Some(text) if !text.is_empty() => {
                let truncated = truncate_summary(&text);
                if truncated != text {
                    substitutions.push(Substitution::SummaryTruncated {
                        chars: text.chars().count(),
                    });
                }
                truncated
            }
            _ => {
                substitutions.push(Substitution::MissingSummary);
                NO_SUMMARY.to_string()
            }
        };

        let published_at = match draft.published {
            Some(raw) => parse_timestamp(&raw).unwrap_or_else(|| {
                substitutions.push(Substitution::UnparseableTimestamp(raw.text.clone()));
                ingested_at
            }),
            None => {
                substitutions.push(Substitution::MissingTimestamp);
                ingested_at
            }
        };

        Ok(BuiltRecord {
            record: ArticleRecord {
                title,
                url,
                summary,
                published_at,
                source: source.configured.clone(),
            },
            substitutions,
        })
    }
}

fn resolve_link(source: &Url, link: &str) -> Result<Url, ExtractionError> {
    let url = source
        .join(link)
        .map_err(|e| ExtractionError::InvalidLink {
            link: link.to_string(),
            source: e,
        })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ExtractionError::UnsupportedScheme(url.to_string())),
    }
}

/// Parse a raw timestamp in its declared format, normalized to UTC.
///
/// ISO-8601 input may carry an offset, be a naive date-time (taken as UTC),
/// or be a bare date (midnight UTC).
pub fn parse_timestamp(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    let text = raw.text.trim();
    match raw.format {
        TimestampFormat::Rfc2822 => DateTime::parse_from_rfc2822(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        TimestampFormat::Iso8601 => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt.with_timezone(&Utc));
            }
            for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
    }
}

/// Fixed-width ISO-8601 form used for the `published_at` column, so that
/// ordering the text column orders by time.
pub fn format_stored_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{ELLIPSIS, SUMMARY_MAX_CHARS};
    use chrono::TimeZone;

    fn source() -> Source {
        Source::parse("https://news.example.org/world/").unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_empty_draft_gets_every_default() {
        let built = ArticleRecord::from_draft(RecordDraft::default(), &source(), fixed_now()).unwrap();

        assert_eq!(built.record.title, NO_TITLE);
        assert_eq!(built.record.url, source().url);
        assert_eq!(built.record.summary, NO_SUMMARY);
        assert_eq!(built.record.published_at, fixed_now());
        assert_eq!(built.record.source, "https://news.example.org/world/");
        assert_eq!(
            built.substitutions,
            vec![
                Substitution::MissingTitle,
                Substitution::MissingLink,
                Substitution::MissingSummary,
                Substitution::MissingTimestamp,
            ]
        );
    }

    #[test]
    fn test_complete_draft_needs_no_substitution() {
        let draft = RecordDraft {
            title: Some("  Markets   rally ".to_string()),
            link: Some("https://news.example.org/markets/1".to_string()),
            description: Some("<p>Stocks <b>rose</b> today.</p>".to_string()),
            published: Some(RawTimestamp {
                text: "Tue, 10 Jun 2003 04:00:00 GMT".to_string(),
                format: TimestampFormat::Rfc2822,
            }),
        };
        let built = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap();

        assert!(built.substitutions.is_empty());
        assert_eq!(built.record.title, "Markets rally");
        assert_eq!(built.record.url.as_str(), "https://news.example.org/markets/1");
        assert_eq!(built.record.summary, "Stocks rose today.");
        assert_eq!(
            built.record.published_at,
            Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_whitespace_title_counts_as_missing() {
        let draft = RecordDraft {
            title: Some(" \n ".to_string()),
            ..Default::default()
        };
        let built = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap();
        assert_eq!(built.record.title, NO_TITLE);
    }

    #[test]
    fn test_title_entities_are_decoded() {
        let draft = RecordDraft {
            title: Some("Fish&nbsp;Chips &amp; <b>Peas</b>".to_string()),
            ..Default::default()
        };
        let built = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap();
        assert_eq!(built.record.title, "Fish Chips & Peas");
    }

    #[test]
    fn test_source_is_kept_as_configured() {
        let source = Source::parse("HTTPS://News.Example.org:443/World").unwrap();
        let draft = RecordDraft {
            link: Some("story/1".to_string()),
            ..Default::default()
        };
        let built = ArticleRecord::from_draft(draft, &source, fixed_now()).unwrap();

        assert_eq!(built.record.source, "HTTPS://News.Example.org:443/World");
        assert_eq!(built.record.url.as_str(), "https://news.example.org/story/1");

        let bare = Source::parse("https://b.test").unwrap();
        let built = ArticleRecord::from_draft(RecordDraft::default(), &bare, fixed_now()).unwrap();
        assert_eq!(built.record.source, "https://b.test");
        assert_eq!(built.record.url.as_str(), "https://b.test/");
    }

    #[test]
    fn test_relative_link_resolves_against_source() {
        let draft = RecordDraft {
            link: Some("/story/42".to_string()),
            ..Default::default()
        };
        let built = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap();
        assert_eq!(built.record.url.as_str(), "https://news.example.org/story/42");
    }

    #[test]
    fn test_non_http_link_is_rejected() {
        let draft = RecordDraft {
            link: Some("mailto:desk@example.org".to_string()),
            ..Default::default()
        };
        let err = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_unresolvable_link_is_rejected() {
        let draft = RecordDraft {
            link: Some("http://".to_string()),
            ..Default::default()
        };
        let err = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidLink { .. }));
    }

    #[test]
    fn test_long_summary_is_truncated_after_stripping() {
        let body = "w".repeat(SUMMARY_MAX_CHARS + 50);
        let draft = RecordDraft {
            description: Some(format!("<div><p>{body}</p></div>")),
            ..Default::default()
        };
        let built = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap();

        assert!(built.record.summary.chars().count() <= SUMMARY_MAX_CHARS + ELLIPSIS.len());
        assert!(built.record.summary.ends_with(ELLIPSIS));
        assert!(!built.record.summary.contains('<'));
        assert!(built
            .substitutions
            .contains(&Substitution::SummaryTruncated { chars: SUMMARY_MAX_CHARS + 50 }));
    }

    #[test]
    fn test_markup_only_description_counts_as_missing() {
        let draft = RecordDraft {
            description: Some("<img src=\"x.png\"/>".to_string()),
            ..Default::default()
        };
        let built = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap();
        assert_eq!(built.record.summary, NO_SUMMARY);
    }

    #[test]
    fn test_unparseable_timestamp_falls_back_to_ingestion_time() {
        let draft = RecordDraft {
            published: Some(RawTimestamp {
                text: "yesterday-ish".to_string(),
                format: TimestampFormat::Rfc2822,
            }),
            ..Default::default()
        };
        let built = ArticleRecord::from_draft(draft, &source(), fixed_now()).unwrap();
        assert_eq!(built.record.published_at, fixed_now());
        assert!(built
            .substitutions
            .contains(&Substitution::UnparseableTimestamp("yesterday-ish".to_string())));
    }

    #[test]
    fn test_timestamp_format_is_not_guessed() {
        let iso_as_rss = RawTimestamp {
            text: "2024-05-01T10:00:00Z".to_string(),
            format: TimestampFormat::Rfc2822,
        };
        assert_eq!(parse_timestamp(&iso_as_rss), None);
    }

    #[test]
    fn test_parse_iso8601_variants() {
        let iso = |text: &str| RawTimestamp {
            text: text.to_string(),
            format: TimestampFormat::Iso8601,
        };

        assert_eq!(
            parse_timestamp(&iso("2024-05-01T12:00:00+02:00")),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp(&iso("2024-05-01T10:00:00")),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp(&iso("2024-05-01")),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(&iso("May 1st")), None);
    }

    #[test]
    fn test_stored_timestamp_is_fixed_width() {
        let a = format_stored_timestamp(&Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(a, "2024-05-01T10:00:00.000000Z");

        let b = format_stored_timestamp(&fixed_now());
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn test_record_serialization() {
        let record = ArticleRecord::from_draft(RecordDraft::default(), &source(), fixed_now())
            .unwrap()
            .record;
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"url\":\"https://news.example.org/world/\""));
        assert!(json.contains("No Title"));
    }
}
