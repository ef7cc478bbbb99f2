//! NVD CVE API configuration
//!
//! Endpoint constants live in [`NvdApiConfig`]; the credential and endpoint
//! overrides come from the environment through [`ApiCredentials`] and
//! [`base_url_from_env`].
//!
//! # Quotas
//!
//! NVD allows 5 requests per rolling 30 second window without an API key and
//! 50 with one. Exceeding the quota returns HTTP 403 and the client must wait
//! out the window before repeating the request.

use std::time::Duration;

/// Environment variable holding the optional NVD API key
pub const API_KEY_ENV: &str = "NVD_API_KEY";

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "NVD_BASE_URL";

/// Constants describing the remote API
#[derive(Debug, Clone)]
pub struct NvdApiConfig {
    /// Base URL of the CVE endpoint
    pub base_url: &'static str,

    /// Records requested per page
    pub page_size: u64,

    /// Status code the API uses to signal throttling
    pub rate_limit_status: u16,

    /// Wait imposed after a throttled request
    pub cooldown: Duration,

    /// Header carrying the API key
    pub api_key_header: &'static str,

    /// Requests per window without a key
    pub anonymous_quota: u32,

    /// Requests per window with a key
    pub authenticated_quota: u32,

    /// Quota window length
    pub quota_window: Duration,

    /// Per-request timeout
    pub request_timeout: Duration,
}

/// NVD CVE API 2.0
pub const NVD_CVE_API_CONFIG: NvdApiConfig = NvdApiConfig {
    base_url: "https://services.nvd.nist.gov/rest/json/cves/2.0",
    page_size: 2000,
    rate_limit_status: 403,
    cooldown: Duration::from_secs(30),
    api_key_header: "apiKey",
    anonymous_quota: 5,
    authenticated_quota: 50,
    quota_window: Duration::from_secs(30),
    request_timeout: Duration::from_secs(60),
};

impl NvdApiConfig {
    /// Requests allowed per window for the given credentials
    pub fn quota_for(&self, credentials: &ApiCredentials) -> u32 {
        if credentials.is_authenticated() {
            self.authenticated_quota
        } else {
            self.anonymous_quota
        }
    }
}

impl Default for NvdApiConfig {
    fn default() -> Self {
        NVD_CVE_API_CONFIG
    }
}

/// Optional API key sent with every request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiCredentials {
    api_key: Option<String>,
}

impl ApiCredentials {
    /// No credentials
    pub fn anonymous() -> Self {
        Self { api_key: None }
    }

    /// Use the given key; blank keys count as absent
    pub fn with_api_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let key = key.trim();
        Self {
            api_key: (!key.is_empty()).then(|| key.to_string()),
        }
    }

    /// Read the key from `NVD_API_KEY`
    pub fn from_env() -> Self {
        std::env::var(API_KEY_ENV)
            .map(Self::with_api_key)
            .unwrap_or_else(|_| Self::anonymous())
    }

    /// The key, if one is configured
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Whether a key is configured
    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Base URL from `NVD_BASE_URL`, falling back to the public endpoint
pub fn base_url_from_env() -> String {
    std::env::var(BASE_URL_ENV)
        .ok()
        .map(|url| url.trim().trim_end_matches('?').to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| NVD_CVE_API_CONFIG.base_url.to_string())
}
