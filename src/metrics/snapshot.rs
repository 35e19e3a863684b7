use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub requests_made: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub started_at: DateTime<Local>,
    pub elapsed_seconds: f64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Scraping Statistics ---")?;
        writeln!(f, "Total requests: {}", self.requests_made)?;
        writeln!(f, "Successful: {}", self.success_count)?;
        writeln!(f, "Failed: {}", self.failure_count)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate)?;
        write!(f, "Duration: {:.1}s", self.elapsed_seconds)
    }
}
