//! Sumi-Sieve: a rule-driven crawler and structured-extraction engine
//!
//! This crate walks websites from a set of seed URLs, classifies every
//! discovered link against an ordered rule table, and turns target pages into
//! typed records through declarative per-field extraction pipelines.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod robots;
pub mod rules;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Sieve operations
///
/// Only configuration and sink failures ever reach this level during a run;
/// per-request and per-field failures are contained where they happen.
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
///
/// All of these are raised before the first request is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No seed URLs configured")]
    NoSeeds,

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid rule pattern '{pattern}': {message}")]
    InvalidRulePattern { pattern: String, message: String },

    #[error("Invalid locator '{locator}': {message}")]
    InvalidLocator { locator: String, message: String },

    #[error("Unknown processor '{0}'")]
    UnknownProcessor(String),

    #[error("Invalid argument for processor '{name}': {message}")]
    InvalidProcessorArgument { name: String, message: String },

    #[error("Rule {rule} references unknown extractor '{extractor}'")]
    UnknownExtractor { rule: usize, extractor: String },
}

/// URL-specific errors
///
/// These describe links that could not be turned into a fetchable absolute
/// URL. The offending link is dropped; the crawl continues.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Excluded link: {0}")]
    Excluded(String),
}

/// Result type alias for Sumi-Sieve operations
pub type Result<T> = std::result::Result<T, SieveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunSummary};
pub use extract::{FieldValue, Record};
pub use rules::{Action, RuleSet};
pub use crate::url::{canonicalize_url, extract_domain, DomainPolicy};
