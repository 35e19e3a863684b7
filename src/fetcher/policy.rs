use rand::Rng;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RATE_LIMIT_PENALTY: Duration = Duration::from_secs(60);

/// Uniform random addition to the base delay, drawn from `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Jitter {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_millis(1500),
        }
    }
}

impl Jitter {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        Duration::from_secs_f64(rng.gen_range(self.min.as_secs_f64()..self.max.as_secs_f64()))
    }
}

/// What happens when the site answers 429.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts for one logical fetch, the first one included.
    pub max_attempts: u32,
    /// Fixed wait after every 429, independent of jitter.
    pub rate_limit_penalty: Duration,
    /// Cap on penalty plus backoff delay spent retrying one URL.
    pub max_backoff_wait: Option<Duration>,
    /// Retries also pay the (doubled) jittered politeness delay on top of the
    /// penalty. When off, a retry waits for the penalty only.
    pub jitter_on_retry: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_penalty: DEFAULT_RATE_LIMIT_PENALTY,
            max_backoff_wait: None,
            jitter_on_retry: true,
        }
    }
}

impl RetryPolicy {
    /// Wait charged against the budget before the next attempt.
    pub fn retry_wait(&self, next_delay: Duration) -> Duration {
        if self.jitter_on_retry {
            self.rate_limit_penalty + next_delay
        } else {
            self.rate_limit_penalty
        }
    }

    pub fn allows_retry(&self, attempts: u32, waited: Duration, next_wait: Duration) -> bool {
        attempts < self.max_attempts
            && self
                .max_backoff_wait
                .is_none_or(|budget| waited + next_wait <= budget)
    }
}
