//! Export command: argument parsing and run wiring

use crate::downloader::progress::{IndicatifProgress, LogProgress, ProgressReporter};
use crate::downloader::{ExportExecutor, ExportSummary};
use crate::fetcher::nvd_config::{base_url_from_env, ApiCredentials, NVD_CVE_API_CONFIG};
use crate::fetcher::nvd_http::NvdClient;
use crate::output::csv::CsvRowWriter;
use crate::output::OutputWriter;
use crate::schema::Schema;
use crate::shutdown::SharedShutdown;
use crate::{MAX_YEAR, MIN_YEAR};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

use super::CliError;

/// Output file used when none is given
pub const DEFAULT_OUTPUT: &str = "vulnData.csv";

/// Command-line interface
#[derive(Parser, Debug, Clone)]
#[command(name = "vuln-data-downloader")]
#[command(
    about = "Download NVD CVE records month by month into a CSV file",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Output CSV file
    #[arg(value_name = "OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// First publication year to export
    #[arg(value_name = "START_YEAR")]
    pub start_year: Option<String>,

    /// Last publication year to export (inclusive)
    #[arg(value_name = "END_YEAR")]
    pub end_year: Option<String>,

    /// Schema file mapping column names to record paths
    #[arg(value_name = "SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Extra query parameters added to every request, e.g. `cvssV3Severity=HIGH&`
    #[arg(value_name = "EXTRA_QUERY")]
    pub extra_query: Option<String>,
}

/// Validated export parameters
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Output CSV file
    pub output: PathBuf,
    /// First year
    pub year_start: i32,
    /// Last year
    pub year_end: i32,
    /// Column mapping
    pub schema: Schema,
    /// Extra query fragment, not yet normalized
    pub extra_query: String,
}

/// Parse a year argument
pub fn parse_year(name: &str, value: Option<&str>) -> Result<i32, CliError> {
    let raw = value.ok_or_else(|| CliError::InvalidArgument(format!("{name} is required")))?;
    let year: i32 = raw
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("{name} '{raw}' is not a valid year")))?;

    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(CliError::InvalidArgument(format!(
            "{name} {year} is outside {MIN_YEAR}..={MAX_YEAR}"
        )));
    }
    Ok(year)
}

impl Cli {
    /// Check arguments and load the schema. Nothing touches the network or the
    /// output file here.
    pub fn validate(&self) -> Result<ExportRequest, CliError> {
        let year_start = parse_year("START_YEAR", self.start_year.as_deref())?;
        let year_end = parse_year("END_YEAR", self.end_year.as_deref())?;

        if year_start > year_end {
            return Err(CliError::InvalidArgument(format!(
                "START_YEAR {year_start} is after END_YEAR {year_end}"
            )));
        }

        let schema = match &self.schema {
            Some(path) => {
                if !path.is_file() {
                    return Err(CliError::InvalidArgument(format!(
                        "schema file not found: {}",
                        path.display()
                    )));
                }
                Schema::load(path)?
            }
            None => Schema::default_nvd(),
        };

        Ok(ExportRequest {
            output: self.output.clone(),
            year_start,
            year_end,
            schema,
            extra_query: self.extra_query.clone().unwrap_or_default(),
        })
    }

    /// Run the export end to end
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<ExportSummary, CliError> {
        let request = self.validate()?;

        let client = NvdClient::with_reqwest(NVD_CVE_API_CONFIG, ApiCredentials::from_env())?
            .with_base_url(base_url_from_env())
            .with_extra_query(&request.extra_query);
        let executor = ExportExecutor::new(client).with_shutdown(shutdown);

        let mut writer = CsvRowWriter::new(&request.output)?;
        let mut progress: Box<dyn ProgressReporter> = if std::io::stderr().is_terminal() {
            Box::new(IndicatifProgress::new())
        } else {
            Box::new(LogProgress::new())
        };

        info!(
            output = %request.output.display(),
            year_start = request.year_start,
            year_end = request.year_end,
            "Exporting CVE records"
        );

        let summary = executor
            .run(
                request.year_start,
                request.year_end,
                &request.schema,
                &mut writer,
                progress.as_mut(),
            )
            .await?;

        writer.close()?;

        info!(
            output = %request.output.display(),
            rows = summary.rows,
            "CSV written"
        );

        Ok(summary)
    }
}
