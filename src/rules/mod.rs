//! Link classification rules
//!
//! Rules are evaluated in declaration order and the first matching rule
//! decides what happens to a link. A link no rule matches is ignored, so a
//! rule with `follow = false` and no extractor acts as a deny rule for
//! everything declared after it.

mod rule;

pub use rule::{Action, Rule};

use crate::config::RuleConfig;
use crate::crawler::Page;
use crate::url::canonicalize_url;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// A page's outbound links, ready for classification
///
/// Holds, for every restricted rule, the set of links found inside that
/// rule's region of the page. Building it is the only step that needs the
/// parsed document.
#[derive(Debug, Clone)]
pub struct SourcePage {
    url: Url,
    base: Url,
    links: Vec<Url>,
    regions: Vec<Option<HashSet<String>>>,
}

impl SourcePage {
    /// URL of the page the links were found on
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// All crawlable links, de-duplicated, in document order
    pub fn links(&self) -> &[Url] {
        &self.links
    }

    fn in_region(&self, rule: usize, link: &Url) -> bool {
        match self.regions.get(rule) {
            Some(Some(region)) => region.contains(&canonicalize_url(link)),
            // unrestricted rule
            Some(None) => true,
            None => false,
        }
    }
}

/// The ordered rule table of a crawl
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compiles configured rules, preserving their order
    pub fn compile(configs: &[RuleConfig]) -> Result<Self, ConfigError> {
        let rules = configs
            .iter()
            .map(Rule::compile)
            .collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Collects the links of a page and the restricted regions they fall in
    pub fn scan(&self, page: &Page) -> SourcePage {
        let regions = self
            .rules
            .iter()
            .map(|rule| {
                rule.restrict().map(|locator| {
                    page.links_within(locator)
                        .iter()
                        .map(canonicalize_url)
                        .collect::<HashSet<_>>()
                })
            })
            .collect();

        SourcePage {
            url: page.url().clone(),
            base: page.base().clone(),
            links: page.links(),
            regions,
        }
    }

    /// Index of the first rule matching `link` on `source`
    pub fn matching_rule(&self, source: &SourcePage, link: &Url) -> Option<usize> {
        self.rules
            .iter()
            .enumerate()
            .find(|(idx, rule)| rule.matches_url(link) && source.in_region(*idx, link))
            .map(|(idx, _)| idx)
    }

    /// Decides what to do with one link found on `source`
    pub fn classify(&self, source: &SourcePage, link: &Url) -> Action {
        match self.matching_rule(source, link) {
            Some(idx) => self.rules[idx].action(),
            None => Action::Ignore,
        }
    }

    /// Classifies a raw href; unresolvable references are ignored
    pub fn classify_href(&self, source: &SourcePage, href: &str) -> Action {
        match crate::crawler::resolve_href(href, &source.base) {
            Some(link) => self.classify(source, &link),
            None => Action::Ignore,
        }
    }

    /// Classifies every link on the page, in document order
    ///
    /// Ignored links are left out. Each returned entry carries the index of
    /// the rule that matched.
    pub fn classify_all(&self, source: &SourcePage) -> Vec<(Url, usize, Action)> {
        source
            .links()
            .iter()
            .filter_map(|link| {
                let idx = self.matching_rule(source, link)?;
                let action = self.rules[idx].action();
                action.enqueues().then(|| (link.clone(), idx, action))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOGUE: &str = r#"
        <html><body>
          <article class="product_pod">
            <h3><a href="catalogue/a-light-in-the-attic_1000/index.html">A Light in the Attic</a></h3>
          </article>
          <article class="product_pod">
            <h3><a href="catalogue/tipping-the-velvet_999/index.html">Tipping the Velvet</a></h3>
          </article>
          <ul class="pager"><li class="next"><a href="catalogue/page-2.html">next</a></li></ul>
          <div class="side_categories">
            <a href="catalogue/category/books/travel_2/index.html">Travel</a>
          </div>
          <a href="https://other.example.org/catalogue/page-9.html">elsewhere</a>
        </body></html>
    "#;

    fn rule(pattern: &str, restrict: Option<&str>, follow: bool, extractor: Option<&str>) -> RuleConfig {
        RuleConfig {
            pattern: pattern.to_string(),
            restrict: restrict.map(str::to_string),
            follow,
            extractor: extractor.map(str::to_string),
        }
    }

    fn source(rules: &RuleSet) -> SourcePage {
        let page = Page::parse(Url::parse("https://books.toscrape.com/").unwrap(), CATALOGUE);
        rules.scan(&page)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn books_rules() -> RuleSet {
        RuleSet::compile(&[
            rule(r"catalogue/page-\d+\.html", Some("li.next"), true, None),
            rule(r"_\d+/index\.html", Some("article.product_pod h3"), false, Some("book")),
        ])
        .unwrap()
    }

    #[test]
    fn test_pager_and_product_links() {
        let rules = books_rules();
        let src = source(&rules);
        assert_eq!(
            rules.classify(&src, &url("https://books.toscrape.com/catalogue/page-2.html")),
            Action::Follow
        );
        assert_eq!(
            rules.classify(&src, &url("https://books.toscrape.com/catalogue/a-light-in-the-attic_1000/index.html")),
            Action::Extract("book".to_string())
        );
    }

    #[test]
    fn test_restriction_excludes_links_outside_region() {
        let rules = books_rules();
        let src = source(&rules);
        // matches the pager pattern but sits outside li.next
        assert_eq!(
            rules.classify(&src, &url("https://other.example.org/catalogue/page-9.html")),
            Action::Ignore
        );
        // matches the product pattern but sits in the sidebar
        assert_eq!(
            rules.classify(&src, &url("https://books.toscrape.com/catalogue/category/books/travel_2/index.html")),
            Action::Ignore
        );
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::compile(&[
            rule(r"/catalogue/", None, true, None),
            rule(r"_\d+/index\.html", None, true, Some("book")),
        ])
        .unwrap();
        let src = source(&rules);
        assert_eq!(
            rules.classify(&src, &url("https://books.toscrape.com/catalogue/tipping-the-velvet_999/index.html")),
            Action::Follow
        );

        let reordered = RuleSet::compile(&[
            rule(r"_\d+/index\.html", None, true, Some("book")),
            rule(r"/catalogue/", None, true, None),
        ])
        .unwrap();
        let src = source(&reordered);
        assert_eq!(
            reordered.classify(&src, &url("https://books.toscrape.com/catalogue/tipping-the-velvet_999/index.html")),
            Action::FollowAndExtract("book".to_string())
        );
    }

    #[test]
    fn test_deny_rule_shadows_later_rules() {
        let rules = RuleSet::compile(&[
            rule(r"/category/", None, false, None),
            rule(r"/catalogue/", None, true, None),
        ])
        .unwrap();
        let src = source(&rules);
        assert_eq!(
            rules.classify(&src, &url("https://books.toscrape.com/catalogue/category/books/travel_2/index.html")),
            Action::Ignore
        );
        assert_eq!(
            rules.classify(&src, &url("https://books.toscrape.com/catalogue/page-2.html")),
            Action::Follow
        );
    }

    #[test]
    fn test_no_rule_matches() {
        let rules = RuleSet::compile(&[rule(r"/never/", None, true, None)]).unwrap();
        let src = source(&rules);
        assert_eq!(rules.classify(&src, &url("https://books.toscrape.com/catalogue/page-2.html")), Action::Ignore);
    }

    #[test]
    fn test_classify_href() {
        let rules = books_rules();
        let src = source(&rules);
        assert_eq!(rules.classify_href(&src, "catalogue/page-2.html"), Action::Follow);
        assert_eq!(rules.classify_href(&src, "javascript:void(0)"), Action::Ignore);
        assert_eq!(rules.classify_href(&src, "http://[::1"), Action::Ignore);
    }

    #[test]
    fn test_classify_all_in_document_order() {
        let rules = books_rules();
        let src = source(&rules);
        let classified: Vec<String> = rules
            .classify_all(&src)
            .into_iter()
            .map(|(link, _, _)| link.path().to_string())
            .collect();
        assert_eq!(
            classified,
            vec![
                "/catalogue/a-light-in-the-attic_1000/index.html",
                "/catalogue/tipping-the-velvet_999/index.html",
                "/catalogue/page-2.html",
            ]
        );
    }

    #[test]
    fn test_invalid_rule_fails_compile() {
        assert!(matches!(
            RuleSet::compile(&[rule("(", None, true, None)]),
            Err(ConfigError::InvalidRulePattern { .. })
        ));
        assert!(matches!(
            RuleSet::compile(&[rule("x", Some("div[["), true, None)]),
            Err(ConfigError::InvalidLocator { .. })
        ));
    }
}
