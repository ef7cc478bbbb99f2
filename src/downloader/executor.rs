//! Export executor: drives every month bucket through paging, encoding and output

use crate::downloader::config::FIRST_ROW_INDEX;
use crate::downloader::progress::ProgressReporter;
use crate::downloader::rate_limit::{Clock, TokioClock};
use crate::downloader::DownloadError;
use crate::fetcher::pagination::{BucketPager, FetchedPage, PagerPolicy};
use crate::fetcher::PageSource;
use crate::output::csv::RowEncoder;
use crate::output::RowsWriter;
use crate::schema::Schema;
use crate::shutdown::{self, SharedShutdown};
use crate::TimeBucket;
use tracing::{debug, info, warn};

/// Totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Buckets completed
    pub buckets: usize,
    /// Pages received
    pub pages: usize,
    /// Data rows written
    pub rows: u64,
    /// Rate-limit cooldowns sat through
    pub rate_limit_waits: u32,
    /// Value the row counter would emit next
    pub next_row_index: u64,
}

/// Export executor orchestrates the complete export (one request in flight at a time)
pub struct ExportExecutor<S: PageSource, C: Clock = TokioClock> {
    source: S,
    clock: C,
    policy: PagerPolicy,
    shutdown: Option<SharedShutdown>,
}

impl<S: PageSource> ExportExecutor<S, TokioClock> {
    /// Create an executor using wall-clock waits
    pub fn new(source: S) -> Self {
        Self {
            source,
            clock: TokioClock,
            policy: PagerPolicy::default(),
            shutdown: shutdown::get_global_shutdown(),
        }
    }
}

impl<S: PageSource, C: Clock> ExportExecutor<S, C> {
    /// Replace the clock used for cooldowns and backoff
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ExportExecutor<S, C2> {
        ExportExecutor {
            source: self.source,
            clock,
            policy: self.policy,
            shutdown: self.shutdown,
        }
    }

    /// Override retry and cooldown settings
    pub fn with_policy(mut self, policy: PagerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a shared shutdown handle for graceful interruption
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Page source in use
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Export every month from January `year_start` to December `year_end`.
    ///
    /// Writes the header, then streams each page into `sink` as soon as it is
    /// decoded. The row counter starts at 1 and runs across all buckets. On
    /// error the sink is flushed so every complete row is kept.
    pub async fn run<W, P>(
        &self,
        year_start: i32,
        year_end: i32,
        schema: &Schema,
        sink: &mut W,
        progress: &mut P,
    ) -> Result<ExportSummary, DownloadError>
    where
        W: RowsWriter,
        P: ProgressReporter + ?Sized,
    {
        let buckets = TimeBucket::months(year_start, year_end)?;
        if schema.is_empty() {
            return Err(DownloadError::ValidationError(
                "schema has no columns".to_string(),
            ));
        }

        info!(
            year_start,
            year_end,
            buckets = buckets.len(),
            columns = schema.len(),
            page_size = self.source.page_size(),
            "Starting export"
        );

        let result = self.run_buckets(&buckets, schema, sink, progress).await;

        if result.is_err() {
            if let Err(e) = sink.flush() {
                warn!("Failed to flush partial output: {}", e);
            }
        }

        if let Ok(summary) = &result {
            info!(
                buckets = summary.buckets,
                pages = summary.pages,
                rows = summary.rows,
                rate_limit_waits = summary.rate_limit_waits,
                "Export complete"
            );
        }

        result
    }

    async fn run_buckets<W, P>(
        &self,
        buckets: &[TimeBucket],
        schema: &Schema,
        sink: &mut W,
        progress: &mut P,
    ) -> Result<ExportSummary, DownloadError>
    where
        W: RowsWriter,
        P: ProgressReporter + ?Sized,
    {
        let encoder = RowEncoder::new(schema);
        let mut summary = ExportSummary {
            next_row_index: FIRST_ROW_INDEX,
            ..ExportSummary::default()
        };

        sink.write_header(&schema.column_names())?;
        sink.flush()?;

        progress.start(buckets.len());
        for (idx, bucket) in buckets.iter().enumerate() {
            let rows = self.run_bucket(*bucket, &encoder, sink, &mut summary).await?;
            summary.buckets += 1;
            progress.bucket_finished(idx + 1, buckets.len(), bucket, rows);
        }
        progress.finish();

        Ok(summary)
    }

    async fn run_bucket<W: RowsWriter>(
        &self,
        bucket: TimeBucket,
        encoder: &RowEncoder<'_>,
        sink: &mut W,
        summary: &mut ExportSummary,
    ) -> Result<u64, DownloadError> {
        let mut pager = BucketPager::new(bucket, self.source.page_size(), self.policy);
        let mut bucket_rows = 0u64;
        let mut reported_total = 0u64;

        debug!(bucket = %bucket, "Starting bucket");

        loop {
            if self.shutdown_requested() {
                return Err(DownloadError::Interrupted { rows: summary.rows });
            }

            let Some(page) = self.next_page(&mut pager, summary.rows).await? else {
                break;
            };

            let rows = encoder
                .encode_page(&page.response.payload, &mut summary.next_row_index)
                .map_err(|source| DownloadError::EncodingError {
                    bucket,
                    offset: page.offset,
                    source,
                })?;

            sink.write_rows(&rows)?;
            sink.flush()?;

            bucket_rows += rows.len() as u64;
            summary.rows += rows.len() as u64;
            summary.pages += 1;
            reported_total = page.response.total_results;
        }

        summary.rate_limit_waits += pager.rate_limit_waits();

        if bucket_rows != reported_total {
            warn!(
                bucket = %bucket,
                rows = bucket_rows,
                total_results = reported_total,
                "Row count differs from reported total"
            );
        }

        info!(
            bucket = %bucket,
            rows = bucket_rows,
            pages = pager.pages(),
            "Bucket complete"
        );

        Ok(bucket_rows)
    }

    async fn next_page(
        &self,
        pager: &mut BucketPager,
        rows_so_far: u64,
    ) -> Result<Option<FetchedPage>, DownloadError> {
        let bucket = *pager.bucket();
        let fetch = pager.next_page(&self.source, &self.clock);

        let result = match &self.shutdown {
            Some(shutdown) => tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => {
                    return Err(DownloadError::Interrupted { rows: rows_so_far });
                }
                page = fetch => page,
            },
            None => fetch.await,
        };

        result.map_err(|source| DownloadError::FetchError { bucket, source })
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }
}
