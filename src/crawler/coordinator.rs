//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the dispatch loop that coordinates all aspects of
//! the crawling process, including:
//! - Compiling rules and extractors before anything is fetched
//! - Seeding the frontier
//! - Keeping a bounded number of fetches in flight
//! - Running extraction and link classification on each fetched page
//! - Stopping on cutoff, fatal sink errors or an external stop request

use super::fetcher::{FetchError, FetchedPage, Fetcher};
use super::frontier::{CrawlRequest, Frontier, Offer};
use super::parser::Page;
use crate::config::{validate, Config};
use crate::extract::{ExtractorSet, ProcessorRegistry};
use crate::output::{CrawlCounters, Emission, RecordSink, RunSummary};
use crate::rules::RuleSet;
use crate::url::{normalize_url, DomainPolicy};
use crate::{ConfigError, SieveError};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything compiled from a configuration before the crawl starts
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    pub seeds: Vec<Url>,
    pub rules: RuleSet,
    pub extractors: ExtractorSet,
}

impl CrawlPlan {
    /// Validates the configuration and compiles its rules and extractors
    ///
    /// Any error here is reported before a single request is made.
    pub fn compile(config: &Config, registry: &ProcessorRegistry) -> Result<Self, ConfigError> {
        validate(config)?;

        let seeds = config
            .crawler
            .seeds
            .iter()
            .map(|s| {
                normalize_url(s)
                    .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", s, e)))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            seeds,
            rules: RuleSet::compile(&config.rules)?,
            extractors: ExtractorSet::compile(&config.extractors, registry)?,
        })
    }
}

/// State shared by the dispatcher and every worker
struct Shared {
    frontier: Frontier,
    fetcher: Fetcher,
    rules: RuleSet,
    extractors: ExtractorSet,
    sink: RecordSink,
    counters: CrawlCounters,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    name: String,
    seeds: Vec<Url>,
    concurrency: usize,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator using the built-in processors
    ///
    /// Compiles rules and extractors, builds the HTTP client and opens the
    /// output destination. Nothing is fetched yet.
    pub fn new(config: Config) -> Result<Self, SieveError> {
        Self::with_registry(config, &ProcessorRegistry::with_builtins())
    }

    /// Creates a coordinator resolving processors from `registry`
    pub fn with_registry(config: Config, registry: &ProcessorRegistry) -> Result<Self, SieveError> {
        let plan = CrawlPlan::compile(&config, registry)?;
        let fetcher = Fetcher::from_config(&config.crawler, &config.retry)?;
        let sink = RecordSink::open(&config.output, config.crawler.item_cutoff)?;

        let frontier = Frontier::new(
            DomainPolicy::new(&config.crawler.allowed_domains),
            config.crawler.max_depth,
        );

        Ok(Self {
            name: config.crawler.name.clone(),
            seeds: plan.seeds,
            concurrency: config.crawler.concurrent_requests.max(1) as usize,
            shared: Arc::new(Shared {
                frontier,
                fetcher,
                rules: plan.rules,
                extractors: plan.extractors,
                sink,
                counters: CrawlCounters::new(),
            }),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the crawl when cancelled
    ///
    /// In-flight requests complete; nothing new is dispatched.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the crawl to completion
    ///
    /// Finishes when the frontier is exhausted and nothing is in flight, or
    /// when the frontier has been closed (item cutoff, stop request, fatal
    /// sink error) and the in-flight requests have drained.
    pub async fn run(&mut self) -> Result<RunSummary, SieveError> {
        let started_at = Utc::now();
        let shared = Arc::clone(&self.shared);
        tracing::info!(
            "Starting crawl '{}' with {} seeds, {} concurrent requests",
            self.name,
            self.seeds.len(),
            self.concurrency
        );

        for seed in &self.seeds {
            if shared.frontier.seed(seed.clone()) == Offer::Duplicate {
                tracing::debug!("Duplicate seed ignored: {}", seed);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<Result<(), SieveError>> = JoinSet::new();
        let mut fatal: Option<SieveError> = None;

        loop {
            if self.cancel.is_cancelled() && !shared.frontier.is_closed() {
                tracing::warn!("Stop requested, letting in-flight requests finish");
                shared.frontier.close();
            }

            let next = if semaphore.available_permits() > 0 {
                shared.frontier.take()
            } else {
                None
            };

            if let Some(request) = next {
                // Only the dispatcher acquires permits, so this never waits
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let worker = Arc::clone(&shared);
                tasks.spawn(async move {
                    let _permit = permit;
                    worker.process(request).await
                });
                continue;
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = tasks.join_next() => {
                    self.on_task_finished(joined, &mut fatal);
                }
                _ = self.cancel.cancelled(), if !shared.frontier.is_closed() => {
                    tracing::warn!("Stop requested, letting in-flight requests finish");
                    shared.frontier.close();
                }
                else => break,
            }
        }

        // Flush whatever was written, even when the run failed
        let finalized = shared.sink.finalize();
        if let Some(error) = fatal {
            tracing::error!("Crawl '{}' aborted: {}", self.name, error);
            return Err(error);
        }
        finalized?;

        let budget = shared.sink.budget();
        let summary = RunSummary {
            pages_fetched: shared.counters.pages_fetched(),
            pages_failed: shared.counters.pages_failed(),
            records_emitted: budget.emitted(),
            records_truncated: budget.truncated(),
            truncated: budget.is_exhausted(),
            fetch_attempts: shared.counters.fetch_attempts(),
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Crawl '{}' completed: {} pages fetched, {} failed, {} records in {}s",
            self.name,
            summary.pages_fetched,
            summary.pages_failed,
            summary.records_emitted,
            summary.duration().num_seconds()
        );

        Ok(summary)
    }

    fn on_task_finished(
        &self,
        joined: Result<Result<(), SieveError>, JoinError>,
        fatal: &mut Option<SieveError>,
    ) {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!("Fatal error in worker: {}", error);
                self.shared.frontier.close();
                fatal.get_or_insert(error);
            }
            Err(error) => {
                tracing::error!("Worker task failed: {}", error);
                self.shared.counters.record_failed();
            }
        }

        let counters = &self.shared.counters;
        let done = counters.pages_fetched() + counters.pages_failed();
        if done > 0 && done % 10 == 0 {
            tracing::info!(
                "Progress: {} pages done, {} in frontier, {} records",
                done,
                self.shared.frontier.len(),
                self.shared.sink.budget().emitted()
            );
        }
    }
}

impl Shared {
    /// Fetches one request and handles the page
    async fn process(&self, request: CrawlRequest) -> Result<(), SieveError> {
        let result = self.fetcher.fetch(request).await;
        self.counters.record_attempts(result.attempts);

        match result.outcome {
            Ok(page) => {
                self.counters.record_fetched();
                tracing::debug!("Fetched {} ({})", page.final_url, page.status_code);
                self.handle_page(&result.request, page)
            }
            Err(error) => {
                self.counters.record_failed();
                match &error {
                    FetchError::DomainNotAllowed(_) => tracing::debug!("{}", error),
                    FetchError::RobotsDenied(_) => tracing::info!("{}", error),
                    _ => tracing::warn!("Failed to fetch {}: {}", result.request.url, error),
                }
                Ok(())
            }
        }
    }

    /// Extracts records and classifies links of a fetched page
    ///
    /// The parsed document never crosses an await point.
    fn handle_page(&self, request: &CrawlRequest, fetched: FetchedPage) -> Result<(), SieveError> {
        let page = Page::parse(fetched.final_url, &fetched.body);

        if let Some(name) = &request.extractor {
            match self.extractors.get(name) {
                Some(extractor) => {
                    for record in extractor.extract_all(&page) {
                        match self.sink.accept(&record)? {
                            Emission::Written => {}
                            Emission::CutoffReached | Emission::Truncated => {
                                self.frontier.close();
                            }
                        }
                    }
                }
                None => tracing::warn!("No extractor named '{}'", name),
            }
        }

        if !request.follow_links || self.frontier.is_closed() {
            return Ok(());
        }

        let source = self.rules.scan(&page);
        let mut enqueued = 0;
        for (link, rule, action) in self.rules.classify_all(&source) {
            let offer = self.frontier.offer(CrawlRequest {
                url: link,
                depth: request.depth + 1,
                source_rule: Some(rule),
                extractor: action.extractor().map(str::to_string),
                follow_links: action.follows_links(),
            });
            if offer == Offer::Enqueued {
                enqueued += 1;
            }
        }

        tracing::debug!(
            "{}: {} links, {} newly enqueued",
            page.url(),
            source.links().len(),
            enqueued
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::extract::{FieldValue, ProcessorError};

    const CONFIG: &str = r#"
        [crawler]
        name = "plan"
        seeds = ["https://books.toscrape.com/", "https://books.toscrape.com/#top"]

        [output]
        path = "books.json"

        [[rules]]
        pattern = 'catalogue/page-\d+\.html'

        [[rules]]
        pattern = '_\d+/index\.html'
        follow = false
        extractor = "book"

        [extractors.book]
        [[extractors.book.fields]]
        name = "title"
        locator = "h1"
        processors = ["trim"]
        output = "first"
    "#;

    #[test]
    fn test_plan_compiles() {
        let config = parse_config(CONFIG).unwrap();
        let plan = CrawlPlan::compile(&config, &ProcessorRegistry::with_builtins()).unwrap();
        assert_eq!(plan.seeds.len(), 2);
        assert_eq!(plan.seeds[1].as_str(), "https://books.toscrape.com/");
        assert_eq!(plan.rules.len(), 2);
        assert!(plan.extractors.get("book").is_some());
    }

    #[test]
    fn test_unknown_processor_fails_before_crawl() {
        let config = parse_config(&CONFIG.replace(r#"["trim"]"#, r#"["titlecase"]"#)).unwrap();
        assert!(matches!(
            CrawlPlan::compile(&config, &ProcessorRegistry::with_builtins()),
            Err(ConfigError::UnknownProcessor(_))
        ));
    }

    #[test]
    fn test_custom_processor_registry() {
        let config = parse_config(&CONFIG.replace(r#"["trim"]"#, r#"["shout"]"#)).unwrap();
        let mut registry = ProcessorRegistry::with_builtins();
        registry.register_simple(
            "shout",
            Arc::new(|v: FieldValue| -> Result<FieldValue, ProcessorError> {
                Ok(FieldValue::Text(format!("{}!", v)))
            }),
        );
        assert!(CrawlPlan::compile(&config, &registry).is_ok());
    }
}
