//! Page fetchers for the NVD CVE API

use crate::TimeBucket;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub mod nvd_config;
pub mod nvd_http;
pub mod pagination;
pub mod retry_formatter;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Connection-level failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Unexpected HTTP status
    #[error("HTTP status {status}: {message}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Response body is not a page payload
    #[error("parse error: {0}")]
    ParseError(String),

    /// The server kept throttling the same request
    #[error("still rate limited after {waits} cooldown waits at offset {offset}")]
    RateLimitExhausted {
        /// Number of cooldowns sat through
        waits: u32,
        /// Offset that never got through
        offset: u64,
    },

    /// Pagination did not terminate
    #[error("pagination exceeded {0} pages for a single bucket")]
    TooManyPages(usize),

    /// Client could not be constructed
    #[error("client setup error: {0}")]
    ClientSetup(String),
}

impl FetcherError {
    /// Whether a bounded immediate retry may help.
    ///
    /// Server errors, 429, network failures and undecodable bodies are
    /// retryable. Other 4xx codes are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetcherError::NetworkError(_)
            | FetcherError::Timeout(_)
            | FetcherError::ParseError(_) => true,
            FetcherError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetcherError::RateLimitExhausted { .. }
            | FetcherError::TooManyPages(_)
            | FetcherError::ClientSetup(_) => false,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageEnvelope {
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    results_per_page: Option<u64>,
    #[serde(default)]
    start_index: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// One decoded page of results.
///
/// The raw payload is kept as-is; the record collection inside it is only
/// interpreted by the row encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    /// HTTP status of the response
    pub status: u16,
    /// Total number of results for the whole query
    pub total_results: u64,
    /// Page size reported by the server
    pub results_per_page: Option<u64>,
    /// Offset reported by the server
    pub start_index: Option<u64>,
    /// Server-side generation timestamp
    pub timestamp: Option<String>,
    /// Full decoded body
    pub payload: Value,
}

impl PageResponse {
    /// Decode a response body
    pub fn from_body(status: u16, body: &str) -> FetcherResult<Self> {
        let payload: Value = serde_json::from_str(body)
            .map_err(|e| FetcherError::ParseError(format!("invalid JSON body: {e}")))?;
        Self::from_payload(status, payload)
    }

    /// Wrap an already decoded payload
    pub fn from_payload(status: u16, payload: Value) -> FetcherResult<Self> {
        if !payload.is_object() {
            return Err(FetcherError::ParseError(
                "page payload is not a JSON object".to_string(),
            ));
        }

        let envelope = PageEnvelope::deserialize(&payload)
            .map_err(|e| FetcherError::ParseError(format!("invalid page envelope: {e}")))?;

        Ok(Self {
            status,
            total_results: envelope.total_results,
            results_per_page: envelope.results_per_page,
            start_index: envelope.start_index,
            timestamp: envelope.timestamp,
            payload,
        })
    }

    /// Number of entries in the record collection, if it is a list
    pub fn record_count(&self) -> usize {
        self.payload
            .get(crate::output::csv::COLLECTION_KEY)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// Outcome of one page request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A decoded page
    Page(PageResponse),
    /// The server asked us to back off; no body
    RateLimited,
}

/// Source of result pages for one time bucket.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Request the page starting at `offset` within `bucket`
    async fn fetch_page(&self, bucket: &TimeBucket, offset: u64) -> FetcherResult<FetchOutcome>;

    /// Number of records requested per page
    fn page_size(&self) -> u64;
}

#[async_trait]
impl<S: PageSource + ?Sized> PageSource for Box<S> {
    async fn fetch_page(&self, bucket: &TimeBucket, offset: u64) -> FetcherResult<FetchOutcome> {
        (**self).fetch_page(bucket, offset).await
    }

    fn page_size(&self) -> u64 {
        (**self).page_size()
    }
}
