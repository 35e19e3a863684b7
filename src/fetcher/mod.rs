//! Polite outbound HTTP: jittered delay before every request, penalty and
//! doubling backoff on 429, and the request tallies for the run.

pub mod clock;
pub mod policy;
pub mod transport;

pub use clock::{Sleeper, TokioSleeper};
pub use policy::{Jitter, RetryPolicy};
pub use transport::{RawResponse, ReqwestTransport, Transport};

use crate::config::ScraperConfig;
use crate::error::Result;
use crate::metrics::{RequestOutcome, RequestStats, StatsSnapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);
pub const ROBOTS_DELAY: Duration = Duration::from_secs(1);
pub const ROBOTS_PREVIEW_CHARS: usize = 500;

const STATUS_OK: u16 = 200;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Outcome of one logical fetch. Anything but `Fetched` is an absence of
/// data; the reason has already been logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Fetched(Page),
    Failed,
    GaveUp { attempts: u32 },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Fetched(_))
    }

    pub fn page(&self) -> Option<&Page> {
        match self {
            FetchResult::Fetched(page) => Some(page),
            _ => None,
        }
    }

    pub fn into_page(self) -> Option<Page> {
        match self {
            FetchResult::Fetched(page) => Some(page),
            _ => None,
        }
    }
}

/// Owns the HTTP session and the [`RequestStats`] for one run. Requests are
/// issued strictly one after another; a fetcher is not meant to be shared
/// between workers.
pub struct Fetcher {
    transport: Box<dyn Transport>,
    sleeper: Box<dyn Sleeper>,
    rng: StdRng,
    jitter: Jitter,
    retry: RetryPolicy,
    default_delay: Duration,
    stats: RequestStats,
}

impl Fetcher {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            sleeper: Box::new(TokioSleeper),
            rng: StdRng::from_entropy(),
            jitter: Jitter::default(),
            retry: RetryPolicy::default(),
            default_delay: DEFAULT_DELAY,
            stats: RequestStats::new(),
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let delay = config.delay()?;
        let jitter = config.jitter()?;
        let transport = ReqwestTransport::new(&config.user_agent, config.timeout())?;
        Ok(Self::new(transport)
            .with_default_delay(delay)
            .with_jitter(jitter)
            .with_retry_policy(config.retry_policy()))
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// GETs `url` after a `base_delay + jitter` pause.
    ///
    /// A 429 waits out the rate-limit penalty and tries again with the base
    /// delay doubled, until the [`RetryPolicy`] runs out. The retried 429s are
    /// not tallied; the logical fetch counts once, as a success or a failure.
    pub async fn fetch(&mut self, url: &str, base_delay: Duration) -> FetchResult {
        let mut delay = base_delay;
        let mut waited = Duration::ZERO;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if attempts == 1 || self.retry.jitter_on_retry {
                self.polite_pause(delay).await;
            }

            log::debug!("GET {} (attempt {})", url, attempts);
            let response = match self.transport.get(url).await {
                Ok(response) => response,
                Err(e) => {
                    self.stats.record(RequestOutcome::Failure);
                    log::warn!("Request error for {}: {}", url, e);
                    return FetchResult::Failed;
                }
            };

            match response.status {
                STATUS_OK => {
                    self.stats.record(RequestOutcome::Success);
                    return FetchResult::Fetched(Page {
                        url: url.to_string(),
                        status: response.status,
                        body: response.body,
                    });
                }
                STATUS_TOO_MANY_REQUESTS => {
                    let next_delay = delay.saturating_mul(2);
                    let next_wait = self.retry.retry_wait(next_delay);
                    if !self.retry.allows_retry(attempts, waited, next_wait) {
                        self.stats.record(RequestOutcome::Failure);
                        log::warn!(
                            "Rate limited on {}; giving up after {} attempts",
                            url,
                            attempts
                        );
                        return FetchResult::GaveUp { attempts };
                    }

                    log::warn!(
                        "Rate limited. Waiting {} seconds before retrying {}...",
                        self.retry.rate_limit_penalty.as_secs(),
                        url
                    );
                    self.sleeper.sleep(self.retry.rate_limit_penalty).await;
                    waited += next_wait;
                    delay = next_delay;
                }
                status => {
                    self.stats.record(RequestOutcome::Failure);
                    log::warn!("Request failed with status: {} ({})", status, url);
                    return FetchResult::Failed;
                }
            }
        }
    }

    /// Fetches `{base}/robots.txt` and logs its opening lines. Purely
    /// informational: nothing here restricts later fetches.
    pub async fn check_robots_policy(&mut self, base_url: &Url) -> Option<String> {
        let robots_url = match endpoint(base_url, "robots.txt") {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Cannot build robots.txt URL from {}: {}", base_url, e);
                return None;
            }
        };

        let page = self.fetch(robots_url.as_str(), ROBOTS_DELAY).await.into_page()?;
        let preview: String = page.body.chars().take(ROBOTS_PREVIEW_CHARS).collect();
        log::info!("Robots.txt content:\n{}", preview);
        Some(preview)
    }

    async fn polite_pause(&mut self, base_delay: Duration) {
        let pause = base_delay + self.jitter.sample(&mut self.rng);
        log::debug!("Waiting {:.2}s before next request", pause.as_secs_f64());
        self.sleeper.sleep(pause).await;
    }
}

/// Resolves `path` below `base`, keeping any path prefix `base` already has.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}
