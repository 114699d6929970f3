use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Sumi-Sieve
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub output: OutputConfig,
    /// Link rules, evaluated in declaration order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    /// Named extractors referenced by rules
    #[serde(default)]
    pub extractors: BTreeMap<String, ExtractorConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Name of this crawl, used in log lines
    pub name: String,

    /// URLs the crawl starts from
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Hosts (and their subdomains) that may be fetched; empty allows all
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// Maximum number of requests in flight
    #[serde(rename = "concurrent-requests", default = "default_concurrent_requests")]
    pub concurrent_requests: u32,

    /// Minimum time between request starts to the same host (milliseconds)
    #[serde(rename = "download-delay-ms", default)]
    pub download_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to consult robots.txt before fetching
    #[serde(rename = "obey-robots-txt", default)]
    pub obey_robots_txt: bool,

    /// Maximum link depth from the seeds (unlimited when absent)
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Stop after this many records have been emitted
    #[serde(rename = "item-cutoff", default)]
    pub item_cutoff: Option<u64>,
}

/// Retry behavior for transient fetch failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Retries after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP status codes treated as transient
    #[serde(rename = "http-codes", default = "default_retry_codes")]
    pub http_codes: Vec<u16>,

    /// Whether connection failures are treated as transient
    #[serde(rename = "retry-connection-errors", default = "default_true")]
    pub retry_connection_errors: bool,

    /// Delay before the first retry (milliseconds); doubles each retry
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            http_codes: default_retry_codes(),
            retry_connection_errors: true,
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Destination file
    pub path: String,

    /// Serialization format
    #[serde(default)]
    pub format: OutputFormat,

    /// Replace the destination instead of appending to it
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Fields to export, in order; all fields in record order when empty
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Supported record serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Jsonl,
    Csv,
    Sqlite,
}

/// A single link rule
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Regular expression searched for in the absolute link URL
    pub pattern: String,

    /// Locator restricting which page regions the link may come from
    #[serde(default)]
    pub restrict: Option<String>,

    /// Whether links found on the target page are followed
    #[serde(default = "default_true")]
    pub follow: bool,

    /// Extractor applied to the target page
    #[serde(default)]
    pub extractor: Option<String>,
}

/// A named extractor producing records from a page
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Locator yielding one record per matched element; the whole page otherwise
    #[serde(default)]
    pub scope: Option<String>,

    /// Fields in output order
    pub fields: Vec<FieldConfig>,
}

/// One field of an extractor
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    /// Primary locator
    #[serde(default)]
    pub locator: Option<String>,

    /// Locators tried in order when the primary one yields nothing
    #[serde(default)]
    pub fallback: Vec<String>,

    /// Constant value used instead of a locator
    #[serde(default)]
    pub value: Option<String>,

    /// Input processors, applied in order to every raw match
    #[serde(default)]
    pub processors: Vec<String>,

    /// Output processor reducing the surviving matches
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_true() -> bool {
    true
}

fn default_concurrent_requests() -> u32 {
    16
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("sumi-sieve/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_codes() -> Vec<u16> {
    vec![500, 502, 503, 504, 522, 524, 408, 429]
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_output() -> String {
    "list".to_string()
}
