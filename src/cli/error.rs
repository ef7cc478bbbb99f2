//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::schema::SchemaError;

/// Exit code for bad arguments
pub const EXIT_INVALID_ARGUMENT: i32 = 2;
/// Exit code for an unreadable or malformed schema
pub const EXIT_SCHEMA: i32 = 3;
/// Exit code for a page without a record collection
pub const EXIT_ENCODING: i32 = 4;
/// Exit code for a fetch that failed after retries
pub const EXIT_FETCH: i32 = 5;
/// Exit code for output file failures
pub const EXIT_OUTPUT: i32 = 6;
/// Exit code after Ctrl+C or SIGTERM
pub const EXIT_INTERRUPTED: i32 = 130;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Schema error
    #[error("schema error: {0}")]
    SchemaError(#[from] SchemaError),

    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => EXIT_INVALID_ARGUMENT,
            CliError::SchemaError(_) => EXIT_SCHEMA,
            CliError::FetcherError(_) => EXIT_FETCH,
            CliError::OutputError(_) => EXIT_OUTPUT,
            CliError::DownloadError(e) => match e {
                DownloadError::ValidationError(_) | DownloadError::InvalidYearRange(_) => {
                    EXIT_INVALID_ARGUMENT
                }
                DownloadError::FetchError { .. } => EXIT_FETCH,
                DownloadError::EncodingError { .. } => EXIT_ENCODING,
                DownloadError::OutputError(_) => EXIT_OUTPUT,
                DownloadError::Interrupted { .. } => EXIT_INTERRUPTED,
            },
        }
    }
}
