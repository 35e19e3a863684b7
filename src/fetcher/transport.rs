use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderValue,
};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "ListingCrawler/0.1 (polite single-site crawler)";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and body of one completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// One outbound GET. Errors are transport failures (timeout, DNS, reset);
/// any status code, including 4xx/5xx, is a successful exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse>;
}

/// Session-like client: shared cookie jar, pooled connections and the fixed
/// header set sent with every request.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(default_headers())
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let res = self.client.get(url).send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        log::debug!("{} -> {} ({} bytes)", url, status, body.len());
        Ok(RawResponse { status, body })
    }
}
