//! # Vulnerability Data Downloader Library
//!
//! Downloads CVE records from the NVD CVE API month by month and flattens them
//! into CSV rows according to a configurable column schema.
//!
//! ## Features
//!
//! - **Month Buckets**: Every calendar month in the requested years is fetched as one unit
//! - **Offset Pagination**: 2000 records per page, driven by the reported `totalResults`
//! - **Rate-Limit Cooldown**: Throttled requests are repeated at the same offset after 30 seconds
//! - **Configurable Columns**: Field paths mixing object keys and array indices
//! - **Streaming Output**: Each page is written and flushed before the next one is requested
//!
//! ## Quick Start
//!
//! ```no_run
//! use vuln_data_downloader::downloader::ExportExecutor;
//! use vuln_data_downloader::downloader::progress::NoopProgress;
//! use vuln_data_downloader::fetcher::nvd_config::{ApiCredentials, NVD_CVE_API_CONFIG};
//! use vuln_data_downloader::fetcher::nvd_http::NvdClient;
//! use vuln_data_downloader::output::csv::CsvRowWriter;
//! use vuln_data_downloader::output::OutputWriter;
//! use vuln_data_downloader::schema::Schema;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NvdClient::with_reqwest(NVD_CVE_API_CONFIG, ApiCredentials::from_env())?;
//! let executor = ExportExecutor::new(client);
//! let schema = Schema::default_nvd();
//!
//! let mut writer = CsvRowWriter::new("./vulnData.csv")?;
//! let summary = executor
//!     .run(2020, 2020, &schema, &mut writer, &mut NoopProgress)
//!     .await?;
//! writer.close()?;
//! println!("{} rows", summary.rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`schema`] - Column schemas and field projection
//! - [`fetcher`] - NVD page requests, status handling and pagination
//! - [`downloader`] - Bucket driver, retry timing and progress reporting
//! - [`output`] - Row encoding and CSV output
//! - [`cli`] - Command-line entry point

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// CLI command implementation
pub mod cli;

/// Export orchestration
pub mod downloader;

/// Page fetchers
pub mod fetcher;

/// Data output writers
pub mod output;

/// Column schemas
pub mod schema;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use schema::Schema;

/// Earliest year accepted for a bucket
pub const MIN_YEAR: i32 = 1;

/// Latest year accepted for a bucket
pub const MAX_YEAR: i32 = 9999;

/// Timestamp layout expected by the API (ISO-8601, no offset)
const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_milli_opt(23, 59, 59, 999) {
    Some(time) => time,
    None => panic!("23:59:59.999 is a valid time"),
};

/// Invalid year range for [`TimeBucket::months`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BucketError {
    /// Start year comes after end year
    #[error("Start year ({start}) must not be after end year ({end})")]
    ReversedRange {
        /// Requested first year
        start: i32,
        /// Requested last year
        end: i32,
    },

    /// Year outside [`MIN_YEAR`]..=[`MAX_YEAR`]
    #[error("Year {0} is outside the supported range {min}-{max}", min = MIN_YEAR, max = MAX_YEAR)]
    YearOutOfRange(i32),
}

/// One calendar month of publication dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket {
    first_day: NaiveDate,
    last_day: NaiveDate,
}

impl TimeBucket {
    /// Bucket for `year`-`month`; `None` for an invalid month or out-of-range year
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
        let last_day = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
        Some(Self {
            first_day,
            last_day,
        })
    }

    /// Every month from January of `year_start` to December of `year_end`
    pub fn months(year_start: i32, year_end: i32) -> Result<Vec<Self>, BucketError> {
        if year_start > year_end {
            return Err(BucketError::ReversedRange {
                start: year_start,
                end: year_end,
            });
        }
        for year in [year_start, year_end] {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(BucketError::YearOutOfRange(year));
            }
        }

        Ok((year_start..=year_end)
            .flat_map(|year| (1..=12).filter_map(move |month| Self::new(year, month)))
            .collect())
    }

    /// Calendar year
    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    /// Calendar month (1-12)
    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    /// Number of days in the month
    pub fn days_in_month(&self) -> u32 {
        self.last_day.day()
    }

    /// First instant of the month
    pub fn start(&self) -> NaiveDateTime {
        self.first_day.and_time(NaiveTime::MIN)
    }

    /// Last millisecond of the month
    pub fn end(&self) -> NaiveDateTime {
        self.last_day.and_time(END_OF_DAY)
    }

    /// `pubStartDate` query value
    pub fn start_param(&self) -> String {
        self.start().format(API_TIMESTAMP_FORMAT).to_string()
    }

    /// `pubEndDate` query value
    pub fn end_param(&self) -> String {
        self.end().format(API_TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if NaiveDate::from_ymd_opt(year, 2, 29).is_some() => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
