use listing_crawler::fetcher::transport::DEFAULT_USER_AGENT;
use listing_crawler::fetcher::{FetchResult, Fetcher, ReqwestTransport};
use listing_crawler::output::{csv::CsvOutput, json::JsonOutput, save_batch, OutputHandler};
use listing_crawler::testing::RecordingSleeper;
use listing_crawler::{Extractor, ListingRules};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTINGS: &str = r#"
<html><body>
  <div class="crypto-card">
    <span class="crypto-name">Bitcoin</span><span class="crypto-symbol">BTC</span>
    <span class="crypto-price">$64,000.00</span><span class="price-change">+1.2%</span>
  </div>
  <div class="crypto-card"><span class="crypto-name">Broken</span></div>
  <div class="crypto-card">
    <span class="crypto-name">Ethereum</span><span class="crypto-symbol">ETH</span>
    <span class="crypto-price">$3,100.00</span>
  </div>
</body></html>
"#;

fn fetcher(sleeper: &RecordingSleeper) -> Fetcher {
    let transport = ReqwestTransport::new(DEFAULT_USER_AGENT, Duration::from_secs(10)).unwrap();
    Fetcher::new(transport).with_sleeper(sleeper.clone()).with_seed(11)
}

#[tokio::test]
async fn sends_fixed_headers_and_extracts_listings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cryptocurrencies"))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .and(header("accept-language", "en-US,en;q=0.5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTINGS))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let mut extractor = Extractor::new(fetcher(&sleeper), &ListingRules::default()).unwrap();
    let base = Url::parse(&server.uri()).unwrap();

    let batch = extractor.extract_listings(&base).await;

    let names: Vec<_> = batch.iter().map(|r| r.get("name").unwrap()).collect();
    assert_eq!(names, vec!["Bitcoin", "Ethereum"]);
    assert_eq!(batch[1].get("24h_change"), None);

    let stats = extractor.stats();
    assert_eq!((stats.requests_made, stats.success_count, stats.failure_count), (1, 1, 0));
}

#[tokio::test]
async fn rate_limited_request_is_retried_transparently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cryptocurrencies"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cryptocurrencies"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTINGS))
        .with_priority(2)
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let mut extractor = Extractor::new(fetcher(&sleeper), &ListingRules::default()).unwrap();
    let base = Url::parse(&server.uri()).unwrap();

    let batch = extractor.extract_listings(&base).await;

    assert_eq!(batch.len(), 2);
    let stats = extractor.stats();
    assert_eq!((stats.requests_made, stats.success_count, stats.failure_count), (1, 1, 0));
    assert!(sleeper.sleeps().contains(&Duration::from_secs(60)));
    assert!(sleeper.total() >= Duration::from_secs(60));
}

#[tokio::test]
async fn robots_check_then_failed_listing_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cryptocurrencies"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let mut extractor = Extractor::new(fetcher(&sleeper), &ListingRules::default()).unwrap();
    let base = Url::parse(&server.uri()).unwrap();

    let preview = extractor.fetcher_mut().check_robots_policy(&base).await;
    assert_eq!(preview.as_deref(), Some("User-agent: *\nDisallow: /admin\n"));

    let batch = extractor.extract_listings(&base).await;
    assert!(batch.is_empty());

    let stats = extractor.stats();
    assert_eq!((stats.requests_made, stats.success_count, stats.failure_count), (2, 1, 1));
}

#[tokio::test]
async fn unreachable_host_counts_as_failure() {
    let sleeper = RecordingSleeper::new();
    let mut fetcher = fetcher(&sleeper);

    let result = fetcher.fetch("http://127.0.0.1:1/cryptocurrencies", Duration::ZERO).await;

    assert_eq!(result, FetchResult::Failed);
    assert_eq!(fetcher.stats().failure_count, 1);
}

#[tokio::test]
async fn batch_is_saved_to_both_sinks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cryptocurrencies"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTINGS))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let mut extractor = Extractor::new(fetcher(&sleeper), &ListingRules::default()).unwrap();
    let batch = extractor
        .extract_listings(&Url::parse(&server.uri()).unwrap())
        .await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("crypto_data.csv");
    let json_path = dir.path().join("crypto_data.json");
    let mut outputs: Vec<Box<dyn OutputHandler>> = vec![
        Box::new(CsvOutput::new(csv_path.clone())),
        Box::new(JsonOutput::new(json_path.clone())),
    ];
    save_batch(&batch, &mut outputs).await.unwrap();

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["name", "symbol", "price", "24h_change", "timestamp"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    for (row, record) in rows.iter().zip(&batch) {
        assert_eq!(&row[0], record.get("name").unwrap());
        assert_eq!(&row[2], record.get("price").unwrap());
        assert_eq!(&row[4], record.timestamp_string());
    }

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(2));
    assert_eq!(json[1]["symbol"], "ETH");
}

#[tokio::test]
async fn empty_batch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<PathBuf> = vec![dir.path().join("a.csv"), dir.path().join("a.json")];
    let mut outputs: Vec<Box<dyn OutputHandler>> = vec![
        Box::new(CsvOutput::new(paths[0].clone())),
        Box::new(JsonOutput::new(paths[1].clone())),
    ];

    save_batch(&[], &mut outputs).await.unwrap();

    assert!(paths.iter().all(|p| !p.exists()));
}
