use crate::config::RuleConfig;
use crate::extract::Locator;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// What the crawler does with a discovered link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Drop the link
    Ignore,
    /// Fetch the page and classify its links
    Follow,
    /// Fetch the page, extract records with the named extractor, and
    /// classify its links
    FollowAndExtract(String),
    /// Fetch the page and extract records; its links are not followed
    Extract(String),
}

impl Action {
    /// True if the link should be offered to the frontier
    pub fn enqueues(&self) -> bool {
        !matches!(self, Self::Ignore)
    }

    /// True if links on the target page should be classified
    pub fn follows_links(&self) -> bool {
        matches!(self, Self::Follow | Self::FollowAndExtract(_))
    }

    /// Extractor to run on the target page, if any
    pub fn extractor(&self) -> Option<&str> {
        match self {
            Self::FollowAndExtract(name) | Self::Extract(name) => Some(name),
            Self::Ignore | Self::Follow => None,
        }
    }
}

/// One compiled link rule
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    restrict: Option<Locator>,
    follow: bool,
    extractor: Option<String>,
}

impl Rule {
    /// Compiles a configured rule
    pub fn compile(config: &RuleConfig) -> Result<Self, ConfigError> {
        let pattern =
            Regex::new(&config.pattern).map_err(|e| ConfigError::InvalidRulePattern {
                pattern: config.pattern.clone(),
                message: e.to_string(),
            })?;
        let restrict = config.restrict.as_deref().map(Locator::parse).transpose()?;

        Ok(Self {
            pattern,
            restrict,
            follow: config.follow,
            extractor: config.extractor.clone(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn restrict(&self) -> Option<&Locator> {
        self.restrict.as_ref()
    }

    /// Pattern test alone; the pattern may match anywhere in the URL
    pub fn matches_url(&self, url: &Url) -> bool {
        self.pattern.is_match(url.as_str())
    }

    /// The action this rule assigns to the links it matches
    pub fn action(&self) -> Action {
        match (self.follow, &self.extractor) {
            (true, None) => Action::Follow,
            (true, Some(name)) => Action::FollowAndExtract(name.clone()),
            (false, Some(name)) => Action::Extract(name.clone()),
            (false, None) => Action::Ignore,
        }
    }
}
