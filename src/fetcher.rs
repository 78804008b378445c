//! HTTP retrieval of source documents.
//!
//! [`Fetch`] is the seam between the pipeline and the network: the binary
//! uses [`HttpFetcher`], tests plug in canned documents. A fetch is a single
//! GET with a fixed timeout and no retry; any failure is returned as a
//! [`FetchError`] and the caller moves on to the next source.

use crate::error::FetchError;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Timeout applied to each request unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A successfully retrieved document.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// URL the body was served from, after redirects.
    pub url: Url,
    /// `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
    /// Response body decoded as text.
    pub body: String,
}

/// Something that can retrieve one document per URL.
pub trait Fetch {
    /// Retrieve `url`, or describe why it could not be retrieved.
    async fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError>;
}

/// [`Fetch`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError> {
        let t0 = Instant::now();
        let request_error = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            source: e,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Source answered with a non-success status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let effective_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(request_error)?;

        if effective_url != *url {
            debug!(%effective_url, "Followed redirect");
        }
        info!(
            bytes = body.len(),
            content_type = content_type.as_deref().unwrap_or("-"),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched source"
        );

        Ok(RawDocument {
            url: effective_url,
            content_type,
            body,
        })
    }
}
