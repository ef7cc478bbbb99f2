//! Integration tests for logging and tracing

use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use vuln_data_downloader::downloader::progress::{LogProgress, ProgressReporter};
use vuln_data_downloader::TimeBucket;

/// In-memory log sink shared with the subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_default_filter_keeps_crate_info_and_drops_debug() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("vuln_data_downloader=info"))
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        info!(target: "vuln_data_downloader::downloader", "Export started");
        debug!(target: "vuln_data_downloader::downloader", "Page detail");
        info!(target: "reqwest::connect", "Connection opened");
    });

    let output = logs.contents();
    assert!(output.contains("INFO"));
    assert!(output.contains("Export started"));
    assert!(!output.contains("Page detail"));
    assert!(!output.contains("Connection opened"));
}

#[test]
fn test_json_format_emits_one_object_per_event() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("vuln_data_downloader=info"))
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        info!(target: "vuln_data_downloader::downloader", bucket = "2020-03", rows = 1, "Bucket complete");
        warn!(target: "vuln_data_downloader::fetcher", offset = 0, "Rate limited");
    });

    let events: Vec<serde_json::Value> = logs
        .contents()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["level"], "INFO");
    assert_eq!(events[0]["fields"]["message"], "Bucket complete");
    assert_eq!(events[0]["fields"]["bucket"], "2020-03");
    assert_eq!(events[0]["fields"]["rows"], 1);
    assert_eq!(events[1]["level"], "WARN");
    assert_eq!(events[1]["fields"]["offset"], 0);
}

#[test]
fn test_log_progress_reports_every_bucket() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut progress = LogProgress::new();
        progress.start(2);
        progress.bucket_finished(1, 2, &TimeBucket::new(2020, 1).unwrap(), 7);
        progress.bucket_finished(2, 2, &TimeBucket::new(2020, 2).unwrap(), 3);
        progress.finish();

        assert_eq!(progress.state().buckets_done, 2);
        assert_eq!(progress.state().rows_written, 10);
        assert_eq!(progress.state().last_bucket, TimeBucket::new(2020, 2));
    });

    let output = logs.contents();
    assert!(output.contains("[PROGRESS] Bucket 1/2 - 50.0% complete (2020-01) - 7 rows written"));
    assert!(output.contains("[PROGRESS] Bucket 2/2 - 100.0% complete (2020-02) - 10 rows written"));
}
