//! Crawl frontier: the deduplicating FIFO work queue
//!
//! The frontier owns the visited set. A URL's canonical form is recorded the
//! moment it is first enqueued and never removed, so every URL is fetched at
//! most once per run no matter how many pages link to it.

use crate::url::{canonicalize_url, DomainPolicy};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// The URL to fetch
    pub url: Url,

    /// Link distance from the seed (seeds are depth 0)
    pub depth: u32,

    /// Index of the rule that enqueued this request; `None` for seeds
    pub source_rule: Option<usize>,

    /// Extractor to run on the fetched page
    pub extractor: Option<String>,

    /// Whether links on the fetched page are classified
    pub follow_links: bool,
}

impl CrawlRequest {
    /// A seed request: depth 0, follows links, extracts nothing
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            source_rule: None,
            extractor: None,
            follow_links: true,
        }
    }
}

/// Outcome of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Newly recorded and queued
    Enqueued,
    /// Already seen this run
    Duplicate,
    /// Host outside the allowed-domain policy
    Offsite,
    /// Deeper than the configured maximum depth
    TooDeep,
    /// The frontier has been closed
    Closed,
}

#[derive(Debug, Default)]
struct FrontierState {
    visited: HashSet<String>,
    queue: VecDeque<CrawlRequest>,
    closed: bool,
}

/// Shared work queue of a crawl
#[derive(Debug)]
pub struct Frontier {
    policy: DomainPolicy,
    max_depth: Option<u32>,
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new(policy: DomainPolicy, max_depth: Option<u32>) -> Self {
        Self {
            policy,
            max_depth,
            state: Mutex::new(FrontierState::default()),
        }
    }

    /// Offers a discovered link
    ///
    /// Domain and depth checks happen before the visited set is consulted, so
    /// a rejected URL leaves no trace. The visited check and the insertion
    /// happen under one lock.
    pub fn offer(&self, request: CrawlRequest) -> Offer {
        if !self.policy.allows(&request.url) {
            tracing::trace!("Offsite link not enqueued: {}", request.url);
            return Offer::Offsite;
        }
        if self.max_depth.is_some_and(|max| request.depth > max) {
            return Offer::TooDeep;
        }
        self.insert(request)
    }

    /// Enqueues a seed URL
    ///
    /// Seeds bypass the domain policy; the fetcher's allow-list still applies.
    pub fn seed(&self, url: Url) -> Offer {
        self.insert(CrawlRequest::seed(url))
    }

    fn insert(&self, request: CrawlRequest) -> Offer {
        let key = canonicalize_url(&request.url);
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Offer::Closed;
        }
        if !state.visited.insert(key) {
            return Offer::Duplicate;
        }
        state.queue.push_back(request);
        Offer::Enqueued
    }

    /// Pops the oldest queued request; `None` when empty or closed
    pub fn take(&self) -> Option<CrawlRequest> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return None;
        }
        state.queue.pop_front()
    }

    /// Stops the frontier; pending requests are discarded
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.closed {
            tracing::debug!("Closing frontier with {} pending requests", state.queue.len());
        }
        state.closed = true;
        state.queue.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Number of queued requests
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct URLs ever enqueued
    pub fn visited_count(&self) -> usize {
        self.state.lock().unwrap().visited.len()
    }
}
