//! Search stage: query a search provider per organization and record the
//! candidate URLs in a durable CSV log.

mod duckduckgo;
mod log;
mod stage;

pub use duckduckgo::DuckDuckGoProvider;
pub use log::{OrgSearchState, SearchLog, SearchLogEntry, SearchLogError};
pub use stage::{SearchPassReport, SearchStage};

use async_trait::async_trait;
use thiserror::Error;

/// Placeholder values written to the search log instead of a URL.
pub mod sentinel {
    /// The provider answered with zero results.
    pub const NO_RESULTS: &str = "no_results";
    /// The provider call failed.
    pub const ERROR: &str = "error";
    /// The provider refused the query.
    pub const RATE_LIMITED: &str = "rate_limited";
    /// The organization exhausted its failure budget.
    pub const TIMED_OUT: &str = "timed_out";

    pub const ALL: [&str; 4] = [NO_RESULTS, ERROR, RATE_LIMITED, TIMED_OUT];

    /// Entries that count as a failed search attempt.
    pub fn is_failure(value: &str) -> bool {
        matches!(value, ERROR | RATE_LIMITED | TIMED_OUT)
    }

    pub fn is_sentinel(value: &str) -> bool {
        ALL.contains(&value)
    }
}

/// Errors from a search provider.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Run one query and return up to `max_results` result URLs in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError>;
}
