//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Enforcing the allowed-domain list before any network call
//! - The optional robots.txt check
//! - Per-host request spacing
//! - Retry with exponential backoff for transient failures
//! - Error classification

use super::frontier::CrawlRequest;
use super::throttle::HostThrottle;
use crate::config::{CrawlerConfig, RetryConfig};
use crate::robots::RobotsCache;
use crate::url::{extract_domain, DomainPolicy};
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a request produced no page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// A retryable status or connection error; terminal once retries run out
    #[error("transient failure: {0}")]
    Transient(String),

    /// Any other non-success status, or a body that could not be read
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// Host outside the allowed-domain list; no request was sent
    #[error("domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("disallowed by robots.txt: {0}")]
    RobotsDenied(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Page body content
    pub body: String,
}

/// Result of a fetch operation
#[derive(Debug)]
pub struct FetchResult {
    pub request: CrawlRequest,
    pub outcome: Result<FetchedPage, FetchError>,
    /// Requests actually sent, retries included
    pub attempts: u32,
}

/// When and how often to retry
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    http_codes: HashSet<u16>,
    retry_connection_errors: bool,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: if config.enabled { config.max_retries } else { 0 },
            http_codes: config.http_codes.iter().copied().collect(),
            retry_connection_errors: config.retry_connection_errors,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            http_codes: HashSet::new(),
            retry_connection_errors: false,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True if a response with this status should be retried
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.http_codes.contains(&status)
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// `base * 2^(retry - 1)`, capped at the configured maximum.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

/// Builds the HTTP client used for pages and robots.txt
///
/// # Example
///
/// ```
/// use sumi_sieve::config::CrawlerConfig;
/// use sumi_sieve::crawler::build_http_client;
///
/// let config: CrawlerConfig = toml::from_str(r#"
///     name = "books"
///     seeds = ["https://books.toscrape.com/"]
/// "#).unwrap();
/// assert!(build_http_client(&config).is_ok());
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages politely
///
/// One `Fetcher` is shared by every worker of a crawl.
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    user_agent: String,
    policy: DomainPolicy,
    retry: RetryPolicy,
    throttle: HostThrottle,
    robots: Option<RobotsCache>,
}

impl Fetcher {
    pub fn new(
        client: Client,
        user_agent: impl Into<String>,
        policy: DomainPolicy,
        retry: RetryPolicy,
        throttle: HostThrottle,
        obey_robots_txt: bool,
    ) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            policy,
            retry,
            throttle,
            robots: obey_robots_txt.then(RobotsCache::new),
        }
    }

    /// Builds a fetcher from the crawl configuration
    pub fn from_config(
        crawler: &CrawlerConfig,
        retry: &RetryConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(crawler)?,
            crawler.user_agent.clone(),
            DomainPolicy::new(&crawler.allowed_domains),
            RetryPolicy::from_config(retry),
            HostThrottle::new(Duration::from_millis(crawler.download_delay_ms)),
            crawler.obey_robots_txt,
        ))
    }

    /// Fetches one request
    ///
    /// # Request Flow
    ///
    /// 1. Reject hosts outside the allow-list → `DomainNotAllowed`
    /// 2. Consult robots.txt when enabled → `RobotsDenied`
    /// 3. Wait for the host's next start slot
    /// 4. Send the request and classify the outcome
    /// 5. Back off and go to 3 while the failure is transient and retries
    ///    remain
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Success |
    /// | Status in the retry set | Retry, then `Transient` |
    /// | Other status | Immediate `Permanent` |
    /// | Connection error | Retry if enabled, then `Transient` |
    /// | Timeout | Immediate `Timeout` |
    pub async fn fetch(&self, request: CrawlRequest) -> FetchResult {
        let mut attempts = 0;
        let outcome = self.fetch_with_retries(&request.url, &mut attempts).await;
        FetchResult {
            request,
            outcome,
            attempts,
        }
    }

    async fn fetch_with_retries(
        &self,
        url: &Url,
        attempts: &mut u32,
    ) -> Result<FetchedPage, FetchError> {
        let Some(host) = extract_domain(url).filter(|h| self.policy.allows_host(h)) else {
            return Err(FetchError::DomainNotAllowed(url.to_string()));
        };

        if let Some(robots) = &self.robots {
            if !robots
                .is_allowed(&self.client, &self.throttle, &host, url, &self.user_agent)
                .await
            {
                return Err(FetchError::RobotsDenied(url.to_string()));
            }
        }

        loop {
            self.throttle.wait(&host).await;
            *attempts += 1;

            let error = match self.attempt(url).await {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            let retries_done = *attempts - 1;
            if !error.is_transient() || retries_done >= self.retry.max_retries {
                if error.is_transient() && self.retry.max_retries > 0 {
                    tracing::warn!("Giving up on {} after {} attempts: {}", url, attempts, error);
                }
                return Err(error);
            }

            let delay = self.retry.backoff(retries_done + 1);
            tracing::debug!(
                "Retrying {} ({}/{}) in {:?}: {}",
                url,
                retries_done + 1,
                self.retry.max_retries,
                delay,
                error
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Sends a single request
    async fn attempt(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Err(self.classify_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {} for {}", status.as_u16(), url);
            return if self.retry.is_retryable_status(status.as_u16()) {
                Err(FetchError::Transient(message))
            } else {
                Err(FetchError::Permanent(message))
            };
        }

        let final_url = response.url().clone();
        match response.text().await {
            Ok(body) => Ok(FetchedPage {
                final_url,
                status_code: status.as_u16(),
                body,
            }),
            Err(e) if e.is_timeout() => Err(FetchError::Timeout(e.to_string())),
            Err(e) => Err(FetchError::Permanent(format!("failed to read body: {}", e))),
        }
    }

    fn classify_error(&self, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(error.to_string())
        } else if error.is_connect() && self.retry.retry_connection_errors {
            FetchError::Transient(error.to_string())
        } else {
            FetchError::Permanent(error.to_string())
        }
    }
}
