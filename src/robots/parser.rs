//! robots.txt evaluation backed by the `robotstxt` crate

use robotstxt::DefaultMatcher;

/// The robots.txt rules of one host
///
/// A host without usable rules (unreachable robots.txt, non-2xx answer,
/// empty body) allows everything.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    body: Option<String>,
}

impl RobotsRules {
    /// Rules parsed from a robots.txt body
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }
        Self {
            body: Some(content.to_string()),
        }
    }

    /// Rules that allow every URL
    pub fn allow_all() -> Self {
        Self { body: None }
    }

    pub fn is_allow_all(&self) -> bool {
        self.body.is_none()
    }

    /// Checks whether `url` may be fetched by `user_agent`
    ///
    /// `url` may be absolute or a bare path. Groups are matched against the
    /// product token of the agent, so `sumi-sieve/1.0.0` obeys
    /// `User-agent: sumi-sieve`.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.body {
            None => true,
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, product_token(user_agent), url)
            }
        }
    }
}

/// The leading product name of a User-Agent string
fn product_token(user_agent: &str) -> &str {
    user_agent
        .trim()
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .filter(|token| !token.is_empty())
        .unwrap_or(user_agent)
}
