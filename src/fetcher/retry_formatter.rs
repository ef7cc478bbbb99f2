//! Retry message formatting for the page loop.
//!
//! Keeps the wording of retry, cooldown and failure log lines consistent and
//! attaches an actionable hint to the final failure report.

use std::time::Duration;

use crate::fetcher::FetcherError;

/// Classification of retry errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection failed
    NetworkOffline,
    /// Quota exhausted, cooldown required
    Throttled,
    /// HTTP 429
    TooManyRequests,
    /// HTTP 5xx
    ServerError(u16),
    /// Other HTTP 4xx
    ClientError(u16),
    /// Body could not be decoded
    MalformedResponse,
    /// Anything else
    Generic,
}

impl RetryErrorType {
    /// Short description used inside log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::Throttled => "request quota exhausted",
            Self::TooManyRequests => "too many requests",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::ClientError(code) => match code {
                400 => "invalid request",
                401 => "authentication failed",
                404 => "resource not found",
                _ => "client error",
            },
            Self::MalformedResponse => "malformed response",
            Self::Generic => "request failed",
        }
    }

    /// Suggested remediation shown with the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout | Self::NetworkOffline => {
                "Check network connectivity and proxy settings"
            }
            Self::Throttled | Self::TooManyRequests => {
                "Set NVD_API_KEY to raise the request quota from 5 to 50 per 30 seconds"
            }
            Self::ServerError(_) | Self::MalformedResponse => {
                "The NVD service may be degraded, try again later"
            }
            Self::ClientError(_) => {
                "Check the extra query fragment and the API key for typos"
            }
            Self::Generic => "Re-run with RUST_LOG=vuln_data_downloader=debug for details",
        }
    }
}

/// Classify a fetcher error for messaging.
pub fn classify(error: &FetcherError) -> RetryErrorType {
    match error {
        FetcherError::Timeout(_) => RetryErrorType::NetworkTimeout,
        FetcherError::NetworkError(_) => RetryErrorType::NetworkOffline,
        FetcherError::ParseError(_) => RetryErrorType::MalformedResponse,
        FetcherError::RateLimitExhausted { .. } => RetryErrorType::Throttled,
        FetcherError::HttpStatus { status: 429, .. } => RetryErrorType::TooManyRequests,
        FetcherError::HttpStatus { status, .. } if *status >= 500 => {
            RetryErrorType::ServerError(*status)
        }
        FetcherError::HttpStatus { status, .. } if *status >= 400 => {
            RetryErrorType::ClientError(*status)
        }
        _ => RetryErrorType::Generic,
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// What went wrong
    pub error_type: RetryErrorType,
    /// Wait before the next attempt
    pub backoff_duration: Duration,
    /// Bucket label, e.g. "2020-03"
    pub bucket: String,
    /// Page offset being requested
    pub offset: u64,
    /// Original error message
    pub error_message: String,
}

impl RetryContext {
    /// Build a context from an error
    pub fn from_error(
        attempt: u32,
        max_attempts: u32,
        backoff_duration: Duration,
        bucket: impl Into<String>,
        offset: u64,
        error: &FetcherError,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type: classify(error),
            backoff_duration,
            bucket: bucket.into(),
            offset,
            error_message: error.to_string(),
        }
    }

    /// Build a context for a throttled request
    pub fn throttled(
        wait: u32,
        max_waits: u32,
        cooldown: Duration,
        bucket: impl Into<String>,
        offset: u64,
    ) -> Self {
        Self {
            attempt: wait,
            max_attempts: max_waits,
            error_type: RetryErrorType::Throttled,
            backoff_duration: cooldown,
            bucket: bucket.into(),
            offset,
            error_message: "rate limited".to_string(),
        }
    }

    /// Format the retry message
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({} offset {})",
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64(),
            self.bucket,
            self.offset
        )
    }

    /// Format the final failure summary
    pub fn format_failure(&self) -> String {
        [
            format!("[FAILED] Page request failed after {} attempts", self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Bucket: {} (offset {})", self.bucket, self.offset),
            format!("  Suggestion: {}", self.error_type.suggestion()),
        ]
        .join("\n")
    }
}
