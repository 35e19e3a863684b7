pub mod collector;
pub mod snapshot;

pub use collector::{RequestOutcome, RequestStats};
pub use snapshot::StatsSnapshot;
