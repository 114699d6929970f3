//! Locators: where in a document a value comes from
//!
//! A locator is a CSS selector optionally followed by `@attr`. Without an
//! attribute the locator yields the text content of every matched element;
//! with one it yields that attribute's value. An empty selector (`@id`)
//! addresses the context element itself, which is how per-item scopes read
//! their own attributes.

use crate::ConfigError;
use scraper::{ElementRef, Selector};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Text,
    Attr(String),
}

/// A parsed locator expression
#[derive(Debug, Clone)]
pub struct Locator {
    expression: String,
    selector: Option<Selector>,
    target: Target,
}

impl Locator {
    /// Parses a locator expression
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_sieve::extract::Locator;
    ///
    /// assert!(Locator::parse("h1").is_ok());
    /// assert!(Locator::parse("article.product_pod h3 a@title").is_ok());
    /// assert!(Locator::parse("@data-id").is_ok());
    /// assert!(Locator::parse("div[").is_err());
    /// ```
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(invalid(expression, "empty locator"));
        }

        let (css, target) = split_attribute(trimmed);
        if let Target::Attr(name) = &target {
            if name.is_empty() {
                return Err(invalid(expression, "missing attribute name after '@'"));
            }
        }

        let css = css.trim();
        let selector = if css.is_empty() {
            if target == Target::Text {
                return Err(invalid(expression, "empty selector"));
            }
            None
        } else {
            Some(
                Selector::parse(css)
                    .map_err(|e| invalid(expression, &format!("{:?}", e)))?,
            )
        };

        Ok(Self {
            expression: expression.to_string(),
            selector,
            target,
        })
    }

    /// The expression this locator was parsed from
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Elements matched under `root`, in document order
    ///
    /// A locator with an empty selector matches `root` itself.
    pub fn elements<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match &self.selector {
            Some(selector) => root.select(selector).collect(),
            None => vec![root],
        }
    }

    /// Raw string values located under `root`, in document order
    ///
    /// Elements lacking the requested attribute contribute nothing.
    pub fn values(&self, root: ElementRef<'_>) -> Vec<String> {
        self.elements(root)
            .into_iter()
            .filter_map(|el| match &self.target {
                Target::Text => Some(el.text().collect::<String>()),
                Target::Attr(name) => el.value().attr(name).map(str::to_string),
            })
            .collect()
    }
}

fn invalid(expression: &str, message: &str) -> ConfigError {
    ConfigError::InvalidLocator {
        locator: expression.to_string(),
        message: message.to_string(),
    }
}

/// Splits `css@attr` into its parts
///
/// The `@` must sit outside any attribute-selector brackets, so
/// `a[href*='@']` stays a plain text locator.
fn split_attribute(expression: &str) -> (&str, Target) {
    let Some(at) = expression.rfind('@') else {
        return (expression, Target::Text);
    };

    let (css, rest) = expression.split_at(at);
    let name = &rest[1..];
    let balanced = css.matches('[').count() == css.matches(']').count();
    let plain_name = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));

    if balanced && plain_name {
        (css, Target::Attr(name.to_string()))
    } else {
        (expression, Target::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const PAGE: &str = r#"
        <html><body>
          <h1>  A Light in the Attic </h1>
          <ul>
            <li class="skill">SQL</li>
            <li class="skill">Python</li>
          </ul>
          <a class="next" href="page-2.html">next</a>
          <a href="mailto:x@example.com">mail</a>
          <div id="4821" class="job"><span>Data</span> Analyst</div>
        </body></html>
    "#;

    #[test]
    fn test_text_values_are_raw() {
        let doc = Html::parse_document(PAGE);
        let loc = Locator::parse("h1").unwrap();
        assert_eq!(loc.values(doc.root_element()), vec!["  A Light in the Attic "]);
    }

    #[test]
    fn test_text_includes_descendants() {
        let doc = Html::parse_document(PAGE);
        let loc = Locator::parse("div.job").unwrap();
        assert_eq!(loc.values(doc.root_element()), vec!["Data Analyst"]);
    }

    #[test]
    fn test_multiple_matches_keep_document_order() {
        let doc = Html::parse_document(PAGE);
        let loc = Locator::parse("li.skill").unwrap();
        assert_eq!(loc.values(doc.root_element()), vec!["SQL", "Python"]);
    }

    #[test]
    fn test_attribute_target() {
        let doc = Html::parse_document(PAGE);
        let loc = Locator::parse("a.next@href").unwrap();
        assert_eq!(loc.values(doc.root_element()), vec!["page-2.html"]);
    }

    #[test]
    fn test_missing_attribute_yields_nothing() {
        let doc = Html::parse_document(PAGE);
        let loc = Locator::parse("h1@title").unwrap();
        assert!(loc.values(doc.root_element()).is_empty());
    }

    #[test]
    fn test_self_attribute() {
        let doc = Html::parse_document(PAGE);
        let scope = Locator::parse("div.job").unwrap();
        let item = scope.elements(doc.root_element())[0];
        let id = Locator::parse("@id").unwrap();
        assert_eq!(id.values(item), vec!["4821"]);
    }

    #[test]
    fn test_at_sign_inside_brackets_is_not_attribute() {
        let loc = Locator::parse("a[href^='mailto:x@example.com']").unwrap();
        let doc = Html::parse_document(PAGE);
        assert_eq!(loc.values(doc.root_element()), vec!["mail"]);
    }

    #[test]
    fn test_invalid_locators() {
        assert!(Locator::parse("").is_err());
        assert!(Locator::parse("h1@").is_err());
        assert!(matches!(
            Locator::parse("div[["),
            Err(ConfigError::InvalidLocator { .. })
        ));
    }
}
