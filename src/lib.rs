pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod metrics;
pub mod output;
pub mod record;
pub mod selector;
pub mod testing;

pub use config::{ConfigLoader, ScraperConfig};
pub use error::{Error, Result};
pub use extractor::{
    ExtractionRule, ExtractionType, Extractor, FieldRule, ListingParser, ListingRules,
};
pub use fetcher::{FetchResult, Fetcher, Page};
pub use metrics::{RequestStats, StatsSnapshot};
pub use record::{Batch, Record};
pub use selector::{CssSelector, SelectorSpec};
