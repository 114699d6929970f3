//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The deduplicating frontier
//! - HTTP fetching with politeness and retry logic
//! - HTML parsing and link discovery
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod throttle;

pub use crate::output::RunSummary;
pub use coordinator::{Coordinator, CrawlPlan};
pub use fetcher::{build_http_client, FetchError, FetchResult, FetchedPage, Fetcher, RetryPolicy};
pub use frontier::{CrawlRequest, Frontier, Offer};
pub use parser::{resolve_href, Page};
pub use throttle::HostThrottle;

use crate::config::Config;
use crate::SieveError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Compile rules and extractors and open the output
/// 2. Seed the frontier
/// 3. Fetch pages, extract records and follow links
/// 4. Stop on exhaustion, item cutoff or Ctrl-C
/// 5. Flush the output and return the run summary
pub async fn crawl(config: Config) -> Result<RunSummary, SieveError> {
    let mut coordinator = Coordinator::new(config)?;

    let token = coordinator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received");
            token.cancel();
        }
    });

    let result = coordinator.run().await;
    interrupt.abort();
    result
}
