//! Download configuration constants

use std::time::Duration;

/// Maximum number of retries for transient page failures.
/// 5 retries with exponential backoff rides out short outages (max total
/// wait ~1 minute) without spinning on a permanently broken endpoint.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Maximum consecutive rate-limit cooldowns for one page request.
/// 20 cooldowns of 30 seconds is ten minutes of continuous throttling.
pub const MAX_RATE_LIMIT_WAITS: u32 = 20;

/// Maximum number of pages fetched for a single bucket.
/// At 2000 records per page this allows 20 million records per month.
pub const MAX_PAGES_PER_BUCKET: usize = 10_000;

/// First value emitted by row-index columns
pub const FIRST_ROW_INDEX: u64 = 1;

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}
