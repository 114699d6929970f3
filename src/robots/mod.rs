//! Robots.txt handling
//!
//! When enabled, robots.txt is fetched once per host and kept for the rest
//! of the run. A robots.txt that cannot be fetched, or answers with a
//! non-success status, allows everything on that host.

mod parser;

pub use parser::RobotsRules;

use crate::crawler::HostThrottle;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use url::Url;

/// Per-run cache of robots.txt rules, keyed by origin
#[derive(Debug, Default)]
pub struct RobotsCache {
    hosts: Mutex<HashMap<String, Arc<OnceCell<RobotsRules>>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `url` against its host's robots.txt, fetching it on first use
    ///
    /// Concurrent callers for the same host share a single fetch. The fetch
    /// takes a start slot from `throttle` like any page request to `host`.
    pub async fn is_allowed(
        &self,
        client: &Client,
        throttle: &HostThrottle,
        host: &str,
        url: &Url,
        user_agent: &str,
    ) -> bool {
        let origin = url.origin().ascii_serialization();
        let cell = {
            let mut hosts = self.hosts.lock().unwrap();
            Arc::clone(hosts.entry(origin).or_default())
        };

        let rules = cell
            .get_or_init(|| async {
                throttle.wait(host).await;
                fetch_robots(client, url).await
            })
            .await;
        rules.is_allowed(url.as_str(), user_agent)
    }
}

/// Fetches and parses robots.txt for the host of `url`
///
/// Never fails: every problem degrades to [`RobotsRules::allow_all`].
pub async fn fetch_robots(client: &Client, url: &Url) -> RobotsRules {
    let robots_url = match url.join("/robots.txt") {
        Ok(u) => u,
        Err(_) => return RobotsRules::allow_all(),
    };

    tracing::debug!("Fetching {}", robots_url);
    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt unreachable at {}: {}", robots_url, e);
            return RobotsRules::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} answered {}, allowing all",
            robots_url,
            response.status()
        );
        return RobotsRules::allow_all();
    }

    match response.text().await {
        Ok(body) => RobotsRules::from_content(&body),
        Err(e) => {
            tracing::debug!("Failed to read robots.txt body at {}: {}", robots_url, e);
            RobotsRules::allow_all()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AGENT: &str = "sumi-sieve/1.0.0";

    fn page_url(server: &MockServer, route: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: sumi-sieve\nDisallow: /item/"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new();
        let throttle = HostThrottle::new(Duration::ZERO);
        let client = Client::new();

        for route in ["/", "/list/a", "/item/1", "/item/2"] {
            let url = page_url(&server, route);
            let allowed = cache
                .is_allowed(&client, &throttle, "127.0.0.1", &url, AGENT)
                .await;
            assert_eq!(allowed, !route.starts_with("/item/"), "{}", route);
        }
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let rules = fetch_robots(&Client::new(), &page_url(&server, "/admin")).await;
        assert!(rules.is_allow_all());
    }

    #[tokio::test]
    async fn test_robots_fetch_takes_a_throttle_slot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
            .mount(&server)
            .await;

        let cache = RobotsCache::new();
        let throttle = HostThrottle::new(Duration::from_secs(60));
        let url = page_url(&server, "/");
        assert!(
            cache
                .is_allowed(&Client::new(), &throttle, "127.0.0.1", &url, AGENT)
                .await
        );

        // The first page request now has to wait behind the robots.txt request
        assert!(throttle.reserve("127.0.0.1") > Duration::from_secs(50));
    }
}
