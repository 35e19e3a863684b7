use crate::metrics::snapshot::StatsSnapshot;
use chrono::{DateTime, Local};
use std::time::Instant;

/// How a request ended, as far as the tallies are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failure,
}

/// Request tallies for the lifetime of one fetcher.
///
/// Counters only move through [`RequestStats::record`], so
/// `requests_made == success_count + failure_count` always holds.
#[derive(Debug, Clone)]
pub struct RequestStats {
    requests_made: u64,
    success_count: u64,
    failure_count: u64,
    started_at: DateTime<Local>,
    start_time: Instant,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self {
            requests_made: 0,
            success_count: 0,
            failure_count: 0,
            started_at: Local::now(),
            start_time: Instant::now(),
        }
    }
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: RequestOutcome) {
        self.requests_made += 1;
        match outcome {
            RequestOutcome::Success => self.success_count += 1,
            RequestOutcome::Failure => self.failure_count += 1,
        }
    }

    pub fn requests_made(&self) -> u64 {
        self.requests_made
    }

    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let success_rate = if self.requests_made > 0 {
            (self.success_count as f64 / self.requests_made as f64) * 100.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests_made: self.requests_made,
            success_count: self.success_count,
            failure_count: self.failure_count,
            success_rate,
            started_at: self.started_at,
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}
