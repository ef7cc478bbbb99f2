//! Integration tests for the 403 cooldown protocol and bounded retries

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vuln_data_downloader::downloader::progress::NoopProgress;
use vuln_data_downloader::downloader::{DownloadError, ExportExecutor, ManualClock};
use vuln_data_downloader::fetcher::nvd_config::{ApiCredentials, NVD_CVE_API_CONFIG};
use vuln_data_downloader::fetcher::nvd_http::{HttpRequest, HttpResponse, HttpTransport, NvdClient};
use vuln_data_downloader::fetcher::pagination::{BucketPager, PagerPolicy};
use vuln_data_downloader::fetcher::{FetcherError, FetcherResult};
use vuln_data_downloader::output::MemoryRowsWriter;
use vuln_data_downloader::{Schema, TimeBucket};

/// Plays back queued responses, then answers with an empty page
struct ScriptedTransport {
    script: Mutex<VecDeque<FetcherResult<HttpResponse>>>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    fn new(script: Vec<FetcherResult<HttpResponse>>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let urls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script: Mutex::new(script.into()),
                urls: urls.clone(),
            },
            urls,
        )
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &HttpRequest) -> FetcherResult<HttpResponse> {
        self.urls.lock().unwrap().push(request.url.clone());
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(HttpResponse {
                status: 200,
                body: json!({ "totalResults": 0, "vulnerabilities": [] }).to_string(),
            })
        })
    }
}

fn throttled() -> FetcherResult<HttpResponse> {
    Ok(HttpResponse {
        status: 403,
        body: String::new(),
    })
}

fn one_record() -> FetcherResult<HttpResponse> {
    Ok(HttpResponse {
        status: 200,
        body: json!({
            "totalResults": 1,
            "vulnerabilities": [{ "cve": { "id": "CVE-2022-0042" } }]
        })
        .to_string(),
    })
}

fn client(script: Vec<FetcherResult<HttpResponse>>) -> (NvdClient<ScriptedTransport>, Arc<Mutex<Vec<String>>>) {
    let (transport, urls) = ScriptedTransport::new(script);
    (
        NvdClient::new(transport, NVD_CVE_API_CONFIG, ApiCredentials::anonymous()),
        urls,
    )
}

#[tokio::test]
async fn test_single_throttle_retries_same_request_after_cooldown() {
    let (source, urls) = client(vec![throttled(), one_record()]);
    let clock = ManualClock::new();
    let bucket = TimeBucket::new(2022, 5).unwrap();
    let mut pager = BucketPager::new(bucket, 2000, PagerPolicy::default());

    let page = pager.next_page(&source, &clock).await.unwrap().unwrap();
    assert_eq!(page.offset, 0);
    assert_eq!(page.response.total_results, 1);
    assert!(pager.next_page(&source, &clock).await.unwrap().is_none());

    let urls = urls.lock().unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0], urls[1]);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
    assert!(clock.elapsed() >= Duration::from_secs(30));
    assert_eq!(pager.rate_limit_waits(), 1);
}

#[tokio::test]
async fn test_throttling_is_counted_in_summary_and_rows_are_not_duplicated() {
    let (source, _) = client(vec![throttled(), throttled(), one_record()]);
    let clock = Arc::new(ManualClock::new());
    let executor = ExportExecutor::new(source).with_clock(clock.clone());
    let schema = Schema::parse("n:null\nid:cve,id\n").unwrap();
    let mut sink = MemoryRowsWriter::new();

    let summary = executor
        .run(2022, 2022, &schema, &mut sink, &mut NoopProgress)
        .await
        .unwrap();

    assert_eq!(summary.rate_limit_waits, 2);
    assert_eq!(summary.rows, 1);
    assert_eq!(sink.rows, vec![vec!["1".to_string(), "\"CVE-2022-0042\"".to_string()]]);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(30); 2]);
}

#[tokio::test]
async fn test_persistent_throttling_is_bounded() {
    let (source, urls) = client((0..10).map(|_| throttled()).collect());
    let clock = Arc::new(ManualClock::new());
    let policy = PagerPolicy {
        max_rate_limit_waits: 3,
        ..PagerPolicy::default()
    };
    let executor = ExportExecutor::new(source)
        .with_clock(clock.clone())
        .with_policy(policy);
    let mut sink = MemoryRowsWriter::new();

    let err = executor
        .run(2022, 2022, &Schema::default_nvd(), &mut sink, &mut NoopProgress)
        .await
        .unwrap_err();

    match err {
        DownloadError::FetchError {
            source: FetcherError::RateLimitExhausted { waits, offset },
            ..
        } => {
            assert_eq!(waits, 3);
            assert_eq!(offset, 0);
        }
        other => panic!("expected exhausted rate limit, got {other:?}"),
    }
    assert_eq!(urls.lock().unwrap().len(), 4);
    assert_eq!(clock.sleeps().len(), 3);
}

#[tokio::test]
async fn test_server_errors_back_off_then_recover() {
    let server_error = || {
        Ok(HttpResponse {
            status: 503,
            body: "unavailable".to_string(),
        })
    };
    let (source, _) = client(vec![
        server_error(),
        Err(FetcherError::Timeout("slow".to_string())),
        one_record(),
    ]);
    let clock = ManualClock::new();
    let mut pager = BucketPager::new(TimeBucket::new(2022, 1).unwrap(), 2000, PagerPolicy::default());

    let page = pager.next_page(&source, &clock).await.unwrap().unwrap();
    assert_eq!(page.response.record_count(), 1);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(pager.rate_limit_waits(), 0);
}

#[tokio::test]
async fn test_retries_give_up_after_limit() {
    let (source, urls) = client(
        (0..10)
            .map(|_| Err(FetcherError::NetworkError("connection reset".to_string())))
            .collect(),
    );
    let clock = ManualClock::new();
    let policy = PagerPolicy {
        max_retries: 2,
        ..PagerPolicy::default()
    };
    let mut pager = BucketPager::new(TimeBucket::new(2022, 1).unwrap(), 2000, policy);

    let err = pager.next_page(&source, &clock).await.unwrap_err();
    assert!(matches!(err, FetcherError::NetworkError(_)));
    assert_eq!(urls.lock().unwrap().len(), 3);
    assert_eq!(clock.sleeps().len(), 2);
}
