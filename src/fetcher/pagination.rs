//! Offset pagination for one time bucket
//!
//! [`BucketPager`] drives a small state machine:
//!
//! ```text
//! Fetching(offset) --page--> Fetching(offset + page_size) | Done
//! Fetching(offset) --403---> Waiting(offset, now + cooldown) --> Fetching(offset)
//! Fetching(offset) --transient error--> backoff --> Fetching(offset)
//! ```
//!
//! A throttled request is repeated at the same offset once the cooldown has
//! elapsed, so no page is skipped. Transient failures are retried a bounded
//! number of times; permanent ones end the bucket with an error.
//!
//! Safety limits:
//! - `max_retries` consecutive transient failures
//! - `max_rate_limit_waits` consecutive cooldowns
//! - [`MAX_PAGES_PER_BUCKET`] pages per bucket

use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::downloader::config::{
    calculate_backoff, MAX_PAGES_PER_BUCKET, MAX_RATE_LIMIT_WAITS, MAX_RETRIES,
};
use crate::downloader::rate_limit::Clock;
use crate::fetcher::nvd_config::NVD_CVE_API_CONFIG;
use crate::fetcher::retry_formatter::RetryContext;
use crate::fetcher::{FetchOutcome, FetcherError, FetcherResult, PageResponse, PageSource};
use crate::TimeBucket;

/// Pager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    /// Next step requests the page at `offset`
    Fetching {
        /// Page offset
        offset: u64,
    },
    /// Cooling down before repeating the request at `offset`
    Waiting {
        /// Page offset to repeat
        offset: u64,
        /// Earliest instant the request may be repeated
        deadline: Instant,
    },
    /// All pages delivered
    Done,
}

/// A page together with the offset it was requested at
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Offset used for the request
    pub offset: u64,
    /// Decoded page
    pub response: PageResponse,
}

/// Retry and cooldown settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerPolicy {
    /// Wait after a throttled request
    pub cooldown: Duration,
    /// Consecutive transient failures tolerated
    pub max_retries: u32,
    /// Consecutive cooldowns tolerated
    pub max_rate_limit_waits: u32,
}

impl Default for PagerPolicy {
    fn default() -> Self {
        Self {
            cooldown: NVD_CVE_API_CONFIG.cooldown,
            max_retries: MAX_RETRIES,
            max_rate_limit_waits: MAX_RATE_LIMIT_WAITS,
        }
    }
}

/// Walks all pages of one bucket
#[derive(Debug)]
pub struct BucketPager {
    bucket: TimeBucket,
    page_size: u64,
    policy: PagerPolicy,
    state: PagerState,
    retries: u32,
    rate_limit_waits: u32,
    total_rate_limit_waits: u32,
    pages: usize,
}

impl BucketPager {
    /// Start at offset 0
    pub fn new(bucket: TimeBucket, page_size: u64, policy: PagerPolicy) -> Self {
        Self {
            bucket,
            page_size: page_size.max(1),
            policy,
            state: PagerState::Fetching { offset: 0 },
            retries: 0,
            rate_limit_waits: 0,
            total_rate_limit_waits: 0,
            pages: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> PagerState {
        self.state
    }

    /// Bucket being paged
    pub fn bucket(&self) -> &TimeBucket {
        &self.bucket
    }

    /// Pages delivered so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Cooldowns sat through so far
    pub fn rate_limit_waits(&self) -> u32 {
        self.total_rate_limit_waits
    }

    /// Whether every page has been delivered
    pub fn is_done(&self) -> bool {
        self.state == PagerState::Done
    }

    /// Advance until the next page is available.
    ///
    /// Returns `Ok(None)` once the bucket is exhausted. The caller is expected
    /// to encode each page before asking for the next one.
    pub async fn next_page<S, C>(
        &mut self,
        source: &S,
        clock: &C,
    ) -> FetcherResult<Option<FetchedPage>>
    where
        S: PageSource + ?Sized,
        C: Clock + ?Sized,
    {
        loop {
            match self.state {
                PagerState::Done => return Ok(None),

                PagerState::Waiting { offset, deadline } => {
                    clock.sleep_until(deadline).await;
                    debug!(bucket = %self.bucket, offset, "Cooldown elapsed, repeating request");
                    self.state = PagerState::Fetching { offset };
                }

                PagerState::Fetching { offset } => {
                    if self.pages >= MAX_PAGES_PER_BUCKET {
                        return Err(FetcherError::TooManyPages(MAX_PAGES_PER_BUCKET));
                    }

                    match source.fetch_page(&self.bucket, offset).await {
                        Ok(FetchOutcome::Page(response)) => {
                            return Ok(Some(self.accept(offset, response)));
                        }
                        Ok(FetchOutcome::RateLimited) => {
                            self.enter_cooldown(offset, clock.now())?;
                        }
                        Err(err) if err.is_retryable() && self.retries < self.policy.max_retries => {
                            let backoff = calculate_backoff(self.retries);
                            self.retries += 1;
                            let ctx = RetryContext::from_error(
                                self.retries,
                                self.policy.max_retries,
                                backoff,
                                self.bucket.to_string(),
                                offset,
                                &err,
                            );
                            warn!("{}", ctx.format_retry());
                            clock.sleep(backoff).await;
                        }
                        Err(err) => {
                            let ctx = RetryContext::from_error(
                                self.retries + 1,
                                self.policy.max_retries + 1,
                                Duration::ZERO,
                                self.bucket.to_string(),
                                offset,
                                &err,
                            );
                            error!("{}", ctx.format_failure());
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    fn accept(&mut self, offset: u64, response: PageResponse) -> FetchedPage {
        self.retries = 0;
        self.rate_limit_waits = 0;
        self.pages += 1;

        let next_offset = offset.saturating_add(self.page_size);
        self.state = if next_offset < response.total_results {
            PagerState::Fetching {
                offset: next_offset,
            }
        } else {
            PagerState::Done
        };

        debug!(
            bucket = %self.bucket,
            offset,
            records = response.record_count(),
            total = response.total_results,
            "Page received"
        );

        FetchedPage { offset, response }
    }

    fn enter_cooldown(&mut self, offset: u64, now: Instant) -> FetcherResult<()> {
        if self.rate_limit_waits >= self.policy.max_rate_limit_waits {
            let ctx = RetryContext::throttled(
                self.rate_limit_waits,
                self.policy.max_rate_limit_waits,
                self.policy.cooldown,
                self.bucket.to_string(),
                offset,
            );
            error!("{}", ctx.format_failure());
            return Err(FetcherError::RateLimitExhausted {
                waits: self.rate_limit_waits,
                offset,
            });
        }

        self.rate_limit_waits += 1;
        self.total_rate_limit_waits += 1;
        let ctx = RetryContext::throttled(
            self.rate_limit_waits,
            self.policy.max_rate_limit_waits,
            self.policy.cooldown,
            self.bucket.to_string(),
            offset,
        );
        warn!("Rate limited: {}", ctx.format_retry());

        self.state = PagerState::Waiting {
            offset,
            deadline: now + self.policy.cooldown,
        };
        Ok(())
    }
}
