use crate::error::{Error, Result};
use crate::extractor::{ListingRules, DEFAULT_LISTINGS_PATH};
use crate::fetcher::transport::DEFAULT_USER_AGENT;
use crate::fetcher::{Jitter, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::{Validate, ValidationError};

/// Upper bound for every seconds value given as a float.
const MAX_WAIT_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_scraper_config"))]
pub struct ScraperConfig {
    #[serde(default = "default_name")]
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_listings_path")]
    #[validate(length(min = 1))]
    pub listings_path: String,

    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1))]
    pub user_agent: String,

    /// Politeness delay before each request, before jitter.
    #[serde(default = "default_delay_secs")]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub delay_secs: f64,

    #[serde(default = "default_jitter_min_secs")]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub jitter_min_secs: f64,

    #[serde(default = "default_jitter_max_secs")]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub jitter_max_secs: f64,

    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: u32,

    #[serde(default = "default_rate_limit_penalty_secs")]
    pub rate_limit_penalty_secs: u64,

    #[serde(default)]
    pub max_backoff_wait_secs: Option<u64>,

    /// Retries after a 429 also pay the doubled politeness delay.
    /// Unset means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_on_retry: Option<bool>,

    /// Unset means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_robots: Option<bool>,

    #[serde(default)]
    pub listing: ListingRules,

    #[serde(default = "default_outputs")]
    pub outputs: Vec<OutputConfig>,

    /// Optional path to a parent configuration file to inherit from
    #[serde(default)]
    pub extends: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    Console,
    Json { path: String },
    Csv { path: String },
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_url: default_base_url(),
            listings_path: default_listings_path(),
            user_agent: default_user_agent(),
            delay_secs: default_delay_secs(),
            jitter_min_secs: default_jitter_min_secs(),
            jitter_max_secs: default_jitter_max_secs(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            rate_limit_penalty_secs: default_rate_limit_penalty_secs(),
            max_backoff_wait_secs: None,
            jitter_on_retry: None,
            check_robots: None,
            listing: ListingRules::default(),
            outputs: default_outputs(),
            extends: None,
        }
    }
}

impl ScraperConfig {
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    pub fn delay(&self) -> Result<Duration> {
        secs_to_duration("delay_secs", self.delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn jitter(&self) -> Result<Jitter> {
        Ok(Jitter::new(
            secs_to_duration("jitter_min_secs", self.jitter_min_secs)?,
            secs_to_duration("jitter_max_secs", self.jitter_max_secs)?,
        ))
    }

    pub fn jitter_on_retry(&self) -> bool {
        self.jitter_on_retry.unwrap_or(true)
    }

    pub fn check_robots(&self) -> bool {
        self.check_robots.unwrap_or(true)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            rate_limit_penalty: Duration::from_secs(self.rate_limit_penalty_secs),
            max_backoff_wait: self.max_backoff_wait_secs.map(Duration::from_secs),
            jitter_on_retry: self.jitter_on_retry(),
        }
    }

    /// Points the CSV sink at `path`, adding one if none is configured.
    pub fn set_csv_path(&mut self, path: String) {
        match self.outputs.iter_mut().find(|o| matches!(o, OutputConfig::Csv { .. })) {
            Some(OutputConfig::Csv { path: current }) => *current = path,
            _ => self.outputs.push(OutputConfig::Csv { path }),
        }
    }

    /// Points the JSON sink at `path`, adding one if none is configured.
    pub fn set_json_path(&mut self, path: String) {
        match self.outputs.iter_mut().find(|o| matches!(o, OutputConfig::Json { .. })) {
            Some(OutputConfig::Json { path: current }) => *current = path,
            _ => self.outputs.push(OutputConfig::Json { path }),
        }
    }
}

fn secs_to_duration(field: &str, secs: f64) -> Result<Duration> {
    if secs > MAX_WAIT_SECS {
        return Err(Error::Config(format!(
            "{} must be at most {} seconds, got {}",
            field, MAX_WAIT_SECS, secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("{} = {}: {}", field, secs, e)))
}

fn validate_scraper_config(config: &ScraperConfig) -> std::result::Result<(), ValidationError> {
    let waits = [
        config.delay_secs,
        config.jitter_min_secs,
        config.jitter_max_secs,
    ];
    if waits.iter().any(|secs| !secs.is_finite()) {
        let mut err = ValidationError::new("finite");
        err.message = Some("delay and jitter must be finite numbers".into());
        return Err(err);
    }
    if config.jitter_min_secs > config.jitter_max_secs {
        let mut err = ValidationError::new("jitter_range");
        err.message = Some("jitter_min_secs must not exceed jitter_max_secs".into());
        return Err(err);
    }
    if let Err(reason) = config.listing.check() {
        let mut err = ValidationError::new("listing");
        err.message = Some(reason.into());
        return Err(err);
    }
    Ok(())
}

fn default_name() -> String {
    "coinryze".to_string()
}

fn default_base_url() -> String {
    "https://coinryze.org".to_string()
}

fn default_listings_path() -> String {
    DEFAULT_LISTINGS_PATH.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_delay_secs() -> f64 {
    3.0
}

fn default_jitter_min_secs() -> f64 {
    0.5
}

fn default_jitter_max_secs() -> f64 {
    1.5
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    crate::fetcher::policy::DEFAULT_MAX_ATTEMPTS
}

fn default_rate_limit_penalty_secs() -> u64 {
    60
}

fn default_outputs() -> Vec<OutputConfig> {
    vec![
        OutputConfig::Csv {
            path: "crypto_data.csv".to_string(),
        },
        OutputConfig::Json {
            path: "crypto_data.json".to_string(),
        },
    ]
}
