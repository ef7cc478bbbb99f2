//! Export orchestration
//!
//! This module drives the month-by-month export:
//!
//! 1. **Buckets**: [`crate::TimeBucket::months`] enumerates every month of the requested years
//! 2. **Paging**: [`crate::fetcher::pagination::BucketPager`] walks each month's pages
//! 3. **Encoding**: every page is flattened and written before the next request
//! 4. **Timing**: cooldowns and retry backoff go through a [`rate_limit::Clock`]
//! 5. **Progress**: a [`progress::ProgressReporter`] is told about each finished month
//!
//! # Error Handling
//!
//! All operations return `Result<T, DownloadError>`:
//! - Validation errors (before any request is made)
//! - Fetch errors (after bounded retries)
//! - Encoding errors (payload without a record collection)
//! - Output errors (file cannot be written)
//!
//! Rows written before a failure stay in the output file.

pub mod config;
pub mod executor;
pub mod progress;
pub mod rate_limit;

pub use executor::{ExportExecutor, ExportSummary};
pub use rate_limit::{Clock, ManualClock, TokioClock};

use crate::fetcher::FetcherError;
use crate::output::csv::EncodingError;
use crate::output::OutputError;
use crate::{BucketError, TimeBucket};

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Invalid run parameters
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Year range cannot be split into buckets
    #[error("invalid year range: {0}")]
    InvalidYearRange(#[from] BucketError),

    /// A page could not be fetched
    #[error("fetch failed for {bucket}: {source}")]
    FetchError {
        /// Month being fetched
        bucket: TimeBucket,
        /// Underlying fetcher error
        #[source]
        source: FetcherError,
    },

    /// A page could not be flattened
    #[error("encoding failed for {bucket} at offset {offset}: {source}")]
    EncodingError {
        /// Month being fetched
        bucket: TimeBucket,
        /// Page offset
        offset: u64,
        /// Underlying encoding error
        #[source]
        source: EncodingError,
    },

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Ctrl+C or SIGTERM during the run
    #[error("interrupted after {rows} rows")]
    Interrupted {
        /// Rows written before stopping
        rows: u64,
    },
}
