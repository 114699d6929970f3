//! URL handling module for Sumi-Sieve
//!
//! This module provides link resolution, canonicalization for deduplication,
//! host extraction, and the allowed-domain policy.

mod domain;
mod matcher;
mod normalize;

use ::url::Url;

// Re-export main functions
pub use domain::extract_domain;
pub use matcher::matches_domain;
pub use normalize::{canonicalize_url, normalize_url, resolve_link};

/// The set of hosts a crawl may touch
///
/// An empty policy allows every host. Otherwise a host is allowed when it
/// equals one of the configured domains or is a subdomain of one.
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    allowed: Vec<String>,
}

impl DomainPolicy {
    /// Creates a policy from configured domain names
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: domains
                .into_iter()
                .map(|d| d.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Returns true if the policy places no restriction on hosts
    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Checks a host name against the policy
    pub fn allows_host(&self, host: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let host = host.to_lowercase();
        self.allowed.iter().any(|d| matches_domain(d, &host))
    }

    /// Checks a URL's host against the policy
    ///
    /// URLs without a host are never allowed.
    pub fn allows(&self, url: &Url) -> bool {
        match extract_domain(url) {
            Some(host) => self.allows_host(&host),
            None => false,
        }
    }
}
