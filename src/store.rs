//! SQLite persistence for article records.
//!
//! One table, `news`, keyed by a synthetic id with a `UNIQUE` constraint on
//! `url`. Writes go through `INSERT OR IGNORE`, so the first record stored
//! for a URL is the one that stays; later writes for the same URL do
//! nothing.
//!
//! `published_at` is stored as fixed-width ISO-8601 UTC text, which keeps
//! `ORDER BY published_at` chronological.

use crate::error::PersistenceError;
use crate::models::{format_stored_timestamp, ArticleRecord};
use crate::utils::ensure_parent_dir;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use url::Url;

/// Outcome of [`NewsStore::upsert_ignore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted,
    /// A record with the same URL already existed; nothing was written.
    Duplicate,
}

/// Handle to the news database.
///
/// Owns a single SQLite connection; every method runs on the caller's
/// thread.
pub struct NewsStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl NewsStore {
    /// Open (creating if needed) the database at `db_path` and initialize
    /// its schema.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Database file; missing parent directories are created.
    ///
    /// # Returns
    ///
    /// A ready store, or a [`PersistenceError`] when the directory, the file
    /// or the schema cannot be set up.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let db_path = db_path.into();
        info!(path = %db_path.display(), "Opening news store");

        ensure_parent_dir(&db_path)?;

        let store = Self {
            conn: Connection::open(&db_path)?,
            db_path: Some(db_path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// A private in-memory database, schema included.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Create the `news` table and its index when absent. Safe to repeat.
    pub fn init_schema(&self) -> Result<(), PersistenceError> {
        debug!("Initializing news schema");
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                url TEXT UNIQUE,
                summary TEXT,
                published_at TEXT,
                source TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_news_published_at ON news(published_at);",
        )?;
        Ok(())
    }

    /// Insert `record` unless its URL is already stored.
    ///
    /// # Returns
    ///
    /// [`Insertion::Inserted`] for a new URL, [`Insertion::Duplicate`] when
    /// a record with that URL was already there. The stored record is never
    /// changed.
    #[instrument(level = "debug", skip_all, fields(url = %record.url))]
    pub fn upsert_ignore(&self, record: &ArticleRecord) -> Result<Insertion, PersistenceError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO news (title, url, summary, published_at, source)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.title,
                record.url.as_str(),
                record.summary,
                format_stored_timestamp(&record.published_at),
                record.source,
            ],
        )?;

        let outcome = if changed == 0 {
            Insertion::Duplicate
        } else {
            Insertion::Inserted
        };
        debug!(?outcome, "Stored record");
        Ok(outcome)
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize, PersistenceError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// The `limit` most recently published records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ArticleRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT title, url, summary, published_at, source
             FROM news
             ORDER BY published_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], StoredRow::from_row)?;
        collect_records(rows)
    }

    /// Records whose title or summary contains `keyword`, newest first.
    ///
    /// Matching is a substring match through `LIKE`, which folds ASCII case
    /// only. `%` and `_` in the keyword match literally.
    ///
    /// # Arguments
    ///
    /// * `keyword` - Text to look for in titles and summaries.
    /// * `limit` - Maximum number of records returned.
    pub fn search(&self, keyword: &str, limit: usize) -> Result<Vec<ArticleRecord>, PersistenceError> {
        let pattern = format!("%{}%", escape_like(keyword));
        let mut stmt = self.conn.prepare(
            "SELECT title, url, summary, published_at, source
             FROM news
             WHERE title LIKE ?1 ESCAPE '\\' OR summary LIKE ?1 ESCAPE '\\'
             ORDER BY published_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], StoredRow::from_row)?;
        collect_records(rows)
    }
}

#[cfg(test)]
impl NewsStore {
    pub(crate) fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }
}

/// A row as stored, before its URL and timestamp are re-validated.
struct StoredRow {
    title: String,
    url: String,
    summary: String,
    published_at: String,
    source: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            title: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
            url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            summary: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            published_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            source: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        })
    }

    fn into_record(self) -> Result<ArticleRecord, PersistenceError> {
        let corrupt = |reason: String| PersistenceError::CorruptRow {
            url: self.url.clone(),
            reason,
        };
        let url = Url::parse(&self.url).map_err(|e| corrupt(format!("url: {e}")))?;
        let published_at = DateTime::parse_from_rfc3339(&self.published_at)
            .map_err(|e| corrupt(format!("published_at {:?}: {e}", self.published_at)))?
            .with_timezone(&Utc);

        Ok(ArticleRecord {
            title: self.title,
            url,
            summary: self.summary,
            published_at,
            source: self.source,
        })
    }
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<StoredRow>>,
) -> Result<Vec<ArticleRecord>, PersistenceError> {
    rows.map(|row| row.map_err(PersistenceError::from).and_then(StoredRow::into_record))
        .collect()
}

fn escape_like(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(n: u32, title: &str, summary: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            url: Url::parse(&format!("https://a.test/{n}")).unwrap(),
            summary: summary.to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 5, n, 12, 0, 0).unwrap(),
            source: "https://a.test/feed.xml".to_string(),
        }
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let store = NewsStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.init_schema().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_url_is_ignored_and_first_write_wins() {
        let store = NewsStore::open_in_memory().unwrap();
        let first = record(1, "First", "original");
        let mut second = record(1, "Second", "changed");
        second.published_at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(store.upsert_ignore(&first).unwrap(), Insertion::Inserted);
        assert_eq!(store.upsert_ignore(&second).unwrap(), Insertion::Duplicate);
        assert_eq!(store.upsert_ignore(&first).unwrap(), Insertion::Duplicate);

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.recent(10).unwrap(), vec![first]);
    }

    #[test]
    fn test_count_equals_distinct_urls() {
        let store = NewsStore::open_in_memory().unwrap();
        for n in [1, 2, 1, 3, 2, 1] {
            store.upsert_ignore(&record(n, "t", "s")).unwrap();
        }
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_recent_orders_by_published_at() {
        let store = NewsStore::open_in_memory().unwrap();
        for n in [2, 5, 1, 4, 3] {
            store.upsert_ignore(&record(n, &format!("Day {n}"), "s")).unwrap();
        }

        let titles: Vec<_> = store
            .recent(3)
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, ["Day 5", "Day 4", "Day 3"]);
    }

    #[test]
    fn test_search_is_case_insensitive_over_title_and_summary() {
        let store = NewsStore::open_in_memory().unwrap();
        store.upsert_ignore(&record(1, "Health budget", "numbers")).unwrap();
        store.upsert_ignore(&record(2, "Sports", "a HEALTHY win")).unwrap();
        store.upsert_ignore(&record(3, "Weather", "rain")).unwrap();
        store.upsert_ignore(&record(4, "health again", "x")).unwrap();

        let titles: Vec<_> = store
            .search("health", 10)
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, ["health again", "Sports", "Health budget"]);

        assert_eq!(store.search("health", 2).unwrap().len(), 2);
        assert!(store.search("tornado", 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let store = NewsStore::open_in_memory().unwrap();
        store.upsert_ignore(&record(1, "100% turnout", "s")).unwrap();
        store.upsert_ignore(&record(2, "1000 voters", "s")).unwrap();
        store.upsert_ignore(&record(3, "snake_case", "s")).unwrap();
        store.upsert_ignore(&record(4, "snakeXcase", "s")).unwrap();

        let hits = store.search("0%", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "100% turnout");

        let hits = store.search("e_c", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "snake_case");
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("news.db");

        {
            let store = NewsStore::open(&db_path).unwrap();
            store.upsert_ignore(&record(1, "Persisted", "s")).unwrap();
            assert_eq!(store.db_path(), Some(db_path.as_path()));
        }

        let store = NewsStore::open(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.recent(1).unwrap()[0].title, "Persisted");
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let store = NewsStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO news (title, url, summary, published_at, source)
                 VALUES ('t', 'https://a.test/z', 's', 'last tuesday', 'src')",
                [],
            )
            .unwrap();

        let err = store.recent(1).unwrap_err();
        assert!(matches!(err, PersistenceError::CorruptRow { .. }));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
