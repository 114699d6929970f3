use crate::config::types::{
    Config, CrawlerConfig, ExtractorConfig, OutputConfig, RetryConfig, RuleConfig,
};
use crate::ConfigError;
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Validates the entire configuration
///
/// This covers structural constraints only. Regular expressions, locators and
/// processor names are checked when the rule and extractor tables are
/// compiled, which also happens before any request is made.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_output_config(&config.output)?;
    validate_rules(&config.rules, &config.extractors)?;
    for (name, extractor) in &config.extractors {
        validate_extractor(name, extractor)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation("name cannot be empty".to_string()));
    }

    if config.seeds.is_empty() {
        return Err(ConfigError::NoSeeds);
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    for domain in &config.allowed_domains {
        validate_domain_string(domain)?;
    }

    if config.concurrent_requests < 1 || config.concurrent_requests > 256 {
        return Err(ConfigError::Validation(format!(
            "concurrent_requests must be between 1 and 256, got {}",
            config.concurrent_requests
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.item_cutoff == Some(0) {
        return Err(ConfigError::Validation(
            "item_cutoff must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    for code in &config.http_codes {
        if !(100..=599).contains(code) {
            return Err(ConfigError::Validation(format!(
                "Retry status code {} is not a valid HTTP status",
                code
            )));
        }
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_base_ms ({}) cannot exceed backoff_max_ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for field in &config.fields {
        if !seen.insert(field.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Output field '{}' listed more than once",
                field
            )));
        }
    }

    Ok(())
}

/// Validates rule entries and their extractor references
fn validate_rules(
    rules: &[RuleConfig],
    extractors: &BTreeMap<String, ExtractorConfig>,
) -> Result<(), ConfigError> {
    for (index, rule) in rules.iter().enumerate() {
        if rule.pattern.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Rule {} has an empty pattern",
                index
            )));
        }

        if let Some(extractor) = &rule.extractor {
            if !extractors.contains_key(extractor) {
                return Err(ConfigError::UnknownExtractor {
                    rule: index,
                    extractor: extractor.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Validates one extractor's field table
fn validate_extractor(name: &str, extractor: &ExtractorConfig) -> Result<(), ConfigError> {
    if extractor.fields.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Extractor '{}' declares no fields",
            name
        )));
    }

    let mut seen = HashSet::new();
    for field in &extractor.fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Extractor '{}' has a field with an empty name",
                name
            )));
        }

        if !seen.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Extractor '{}' declares field '{}' twice",
                name, field.name
            )));
        }

        match (&field.locator, &field.value) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(format!(
                    "Field '{}.{}' cannot have both a locator and a constant value",
                    name, field.name
                )));
            }
            (None, None) => {
                return Err(ConfigError::Validation(format!(
                    "Field '{}.{}' needs a locator or a constant value",
                    name, field.name
                )));
            }
            (None, Some(_)) if !field.fallback.is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "Field '{}.{}' has fallback locators but no primary locator",
                    name, field.name
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Validates a domain string
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
