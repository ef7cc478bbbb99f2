//! NVD HTTP client
//!
//! Provides the page request for one time bucket:
//! - Query construction (`pubStartDate`, `pubEndDate`, `resultsPerPage`, `startIndex`)
//! - Optional API key header
//! - Status classification (page, throttled, transient, permanent)
//!
//! The network layer sits behind [`HttpTransport`] so status handling can be
//! exercised without a server.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::fetcher::nvd_config::{ApiCredentials, NvdApiConfig};
use crate::fetcher::{FetchOutcome, FetcherError, FetcherResult, PageResponse, PageSource};
use crate::TimeBucket;

/// Longest response body excerpt carried in an error
const ERROR_BODY_LIMIT: usize = 256;

/// Outgoing GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Full URL including query
    pub url: String,
    /// Extra headers
    pub headers: Vec<(String, String)>,
}

/// Raw response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Body text
    pub body: String,
}

/// Minimal transport contract used by [`NvdClient`]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a GET request and return status and body
    async fn get(&self, request: &HttpRequest) -> FetcherResult<HttpResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Arc<Client>,
}

impl ReqwestTransport {
    /// Build a client with the given request timeout
    pub fn new(timeout: Duration) -> FetcherResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("vuln-data-downloader/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| FetcherError::ClientSetup(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> FetcherResult<HttpResponse> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetcherError {
    if err.is_timeout() {
        FetcherError::Timeout(err.to_string())
    } else {
        FetcherError::NetworkError(err.to_string())
    }
}

/// Page client for the NVD CVE API
pub struct NvdClient<T: HttpTransport = ReqwestTransport> {
    transport: T,
    config: NvdApiConfig,
    base_url: String,
    credentials: ApiCredentials,
    extra_query: String,
}

impl NvdClient<ReqwestTransport> {
    /// Create a client backed by reqwest
    pub fn with_reqwest(
        config: NvdApiConfig,
        credentials: ApiCredentials,
    ) -> FetcherResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::new(transport, config, credentials))
    }
}

impl<T: HttpTransport> NvdClient<T> {
    /// Create a client over an arbitrary transport
    pub fn new(transport: T, config: NvdApiConfig, credentials: ApiCredentials) -> Self {
        info!(
            authenticated = credentials.is_authenticated(),
            quota = config.quota_for(&credentials),
            window_secs = config.quota_window.as_secs(),
            "NVD client ready"
        );
        Self {
            base_url: config.base_url.to_string(),
            transport,
            config,
            credentials,
            extra_query: String::new(),
        }
    }

    /// Point the client at another endpoint (mirror, proxy, test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Splice a caller supplied query fragment into every request
    pub fn with_extra_query(mut self, extra_query: &str) -> Self {
        self.extra_query = normalize_extra_query(extra_query);
        self
    }

    /// API constants in use
    pub fn config(&self) -> &NvdApiConfig {
        &self.config
    }

    /// Build the request for one page
    pub fn build_request(&self, bucket: &TimeBucket, offset: u64) -> HttpRequest {
        let url = format!(
            "{}?{}pubStartDate={}&pubEndDate={}&resultsPerPage={}&startIndex={}",
            self.base_url,
            self.extra_query,
            bucket.start_param(),
            bucket.end_param(),
            self.config.page_size,
            offset
        );

        let headers = self
            .credentials
            .api_key()
            .map(|key| vec![(self.config.api_key_header.to_string(), key.to_string())])
            .unwrap_or_default();

        HttpRequest { url, headers }
    }

    /// Map a raw response onto a fetch outcome
    pub fn classify_response(&self, response: HttpResponse) -> FetcherResult<FetchOutcome> {
        let status = response.status;

        if status == self.config.rate_limit_status {
            return Ok(FetchOutcome::RateLimited);
        }

        if (200..300).contains(&status) {
            return PageResponse::from_body(status, &response.body).map(FetchOutcome::Page);
        }

        Err(FetcherError::HttpStatus {
            status,
            message: excerpt(&response.body),
        })
    }
}

#[async_trait]
impl<T: HttpTransport> PageSource for NvdClient<T> {
    async fn fetch_page(&self, bucket: &TimeBucket, offset: u64) -> FetcherResult<FetchOutcome> {
        let request = self.build_request(bucket, offset);
        debug!(bucket = %bucket, offset, url = %request.url, "Requesting page");

        let response = self.transport.get(&request).await?;
        debug!(bucket = %bucket, offset, status = response.status, "Received response");

        self.classify_response(response)
    }

    fn page_size(&self) -> u64 {
        self.config.page_size
    }
}

/// Normalize a query fragment so it can be placed right after `?`.
///
/// Leading `?`/`&` are dropped and a trailing `&` is ensured when non-empty.
pub fn normalize_extra_query(fragment: &str) -> String {
    let trimmed = fragment.trim().trim_start_matches(['?', '&']);
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.ends_with('&') {
        trimmed.to_string()
    } else {
        format!("{trimmed}&")
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let cut: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    format!("{cut}...")
}
