//! Error types for each stage of the ingestion pipeline.
//!
//! Every kind here is recoverable at some granularity: a [`FetchError`] skips
//! one source, an [`ExtractionError`] drops one candidate item and a
//! [`PersistenceError`] skips one record. Only [`ConfigError`] stops a CLI
//! invocation, and it happens before any source is touched.

use thiserror::Error;

/// Failure to retrieve one source document.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid source URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Failure to build a record from one candidate item.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("link {link:?} is not a valid URL: {source}")]
    InvalidLink {
        link: String,
        #[source]
        source: url::ParseError,
    },

    #[error("link {0} is not an http(s) URL")]
    UnsupportedScheme(String),

    #[error("invalid selector: {0}")]
    Selector(String),
}

/// Failure in the SQLite layer. A unique-key conflict is never reported here.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored row for {url} is unreadable: {reason}")]
    CorruptRow { url: String, reason: String },
}

/// Problems with the run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read sources file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse sources file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no sources configured")]
    NoSources,
}
