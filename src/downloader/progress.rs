//! Per-bucket progress reporting.
//!
//! The executor reports after every completed bucket. [`BucketProgress`] keeps
//! the counters and formats the log line; the reporters decide where it goes
//! (an indicatif bar on a terminal, the log otherwise, nowhere in tests).

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::info;

use crate::TimeBucket;

/// Receives progress signals from the executor
pub trait ProgressReporter {
    /// Called once before the first bucket
    fn start(&mut self, _total_buckets: usize) {}

    /// Called after each bucket completes
    fn bucket_finished(&mut self, index: usize, total: usize, bucket: &TimeBucket, rows: u64);

    /// Called once after the last bucket
    fn finish(&mut self) {}
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn bucket_finished(&mut self, _index: usize, _total: usize, _bucket: &TimeBucket, _rows: u64) {}
}

/// Progress counters and message formatting
#[derive(Debug, Clone)]
pub struct BucketProgress {
    /// Buckets finished so far
    pub buckets_done: usize,
    /// Buckets in the run
    pub total_buckets: usize,
    /// Rows written so far
    pub rows_written: u64,
    /// Last bucket finished
    pub last_bucket: Option<TimeBucket>,
    /// When the run started
    pub start_time: Instant,
}

impl BucketProgress {
    /// Fresh counters
    pub fn new(total_buckets: usize) -> Self {
        Self {
            buckets_done: 0,
            total_buckets,
            rows_written: 0,
            last_bucket: None,
            start_time: Instant::now(),
        }
    }

    /// Record a finished bucket
    pub fn update(&mut self, index: usize, total: usize, bucket: &TimeBucket, rows: u64) {
        self.buckets_done = index;
        self.total_buckets = total;
        self.rows_written = self.rows_written.saturating_add(rows);
        self.last_bucket = Some(*bucket);
    }

    /// Completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total_buckets == 0 {
            return 100.0;
        }
        (self.buckets_done as f64 / self.total_buckets as f64) * 100.0
    }

    /// Remaining time extrapolated from the average bucket duration
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.buckets_done == 0 || self.buckets_done >= self.total_buckets {
            return None;
        }
        let per_bucket = self.start_time.elapsed().as_secs_f64() / self.buckets_done as f64;
        let remaining = (self.total_buckets - self.buckets_done) as f64 * per_bucket;
        Some(Duration::from_secs_f64(remaining))
    }

    /// Human-readable progress string for logging
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Bucket {}/{} - {:.1}% complete",
            self.buckets_done,
            self.total_buckets,
            self.percentage()
        )];

        if let Some(bucket) = &self.last_bucket {
            parts.push(format!("({bucket})"));
        }

        parts.push(format!("- {} rows written", self.rows_written));

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Reports progress through `tracing`
#[derive(Debug, Clone)]
pub struct LogProgress {
    state: BucketProgress,
}

impl LogProgress {
    /// New reporter
    pub fn new() -> Self {
        Self {
            state: BucketProgress::new(0),
        }
    }

    /// Current counters
    pub fn state(&self) -> &BucketProgress {
        &self.state
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for LogProgress {
    fn start(&mut self, total_buckets: usize) {
        self.state = BucketProgress::new(total_buckets);
    }

    fn bucket_finished(&mut self, index: usize, total: usize, bucket: &TimeBucket, rows: u64) {
        self.state.update(index, total, bucket, rows);
        info!("{}", self.state.format_progress());
    }
}

/// Terminal progress bar
pub struct IndicatifProgress {
    bar: ProgressBar,
    state: BucketProgress,
}

impl IndicatifProgress {
    /// Bar drawn to stderr
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Bar drawn to a custom target
    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} months {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self {
            bar,
            state: BucketProgress::new(0),
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for IndicatifProgress {
    fn start(&mut self, total_buckets: usize) {
        self.state = BucketProgress::new(total_buckets);
        self.bar.set_length(total_buckets as u64);
        self.bar.set_position(0);
    }

    fn bucket_finished(&mut self, index: usize, total: usize, bucket: &TimeBucket, rows: u64) {
        self.state.update(index, total, bucket, rows);
        self.bar.set_length(total as u64);
        self.bar.set_position(index as u64);
        self.bar
            .set_message(format!("{bucket} ({} rows)", self.state.rows_written));
    }

    fn finish(&mut self) {
        self.bar.finish_with_message(format!(
            "done ({} rows)",
            self.state.rows_written
        ));
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
