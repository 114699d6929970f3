//! HTML page parsing and link discovery
//!
//! A [`Page`] wraps a parsed document together with the URL it was fetched
//! from and the base URL its relative links resolve against. Link discovery
//! follows these rules:
//!
//! **Include:**
//! - `<a href="...">` and `<area href="...">`
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` links and data URIs
//! - Fragment-only links (same page anchors)
//! - Links whose path ends in a binary file extension
//!
//! Links are returned absolute, without fragments, de-duplicated per page in
//! document order. `rel="nofollow"` links are discovered like any other.

use crate::extract::Locator;
use crate::url::{canonicalize_url, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

const LINK_SELECTOR: &str = "a[href], area[href]";

/// Extensions of resources that are never crawled as pages
const IGNORED_EXTENSIONS: &[&str] = &[
    // images
    "mng", "pct", "bmp", "gif", "jpg", "jpeg", "png", "pst", "psp", "tif", "tiff", "ai", "drw",
    "dxf", "eps", "ps", "svg", "cdr", "ico", "webp",
    // audio
    "mp3", "wma", "ogg", "wav", "ra", "aac", "mid", "au", "aiff",
    // video
    "3gp", "asf", "asx", "avi", "mov", "mp4", "mpg", "qt", "rm", "swf", "wmv", "m4a", "m4v",
    "flv", "webm",
    // office
    "xls", "xlsx", "ppt", "pptx", "pps", "doc", "docx", "odt", "ods", "odg", "odp",
    // other
    "css", "pdf", "exe", "bin", "rss", "dmg", "iso", "apk", "zip", "rar", "gz", "tar",
];

/// A fetched, parsed HTML page
///
/// `Html` is not `Send`, so a `Page` lives and dies inside one synchronous
/// call on the worker that fetched it.
pub struct Page {
    url: Url,
    base: Url,
    document: Html,
}

impl Page {
    /// Parses a response body fetched from `url`
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_sieve::crawler::Page;
    /// use url::Url;
    ///
    /// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
    /// let page = Page::parse(Url::parse("https://example.com/").unwrap(), html);
    /// assert_eq!(page.links()[0].as_str(), "https://example.com/page");
    /// ```
    pub fn parse(url: Url, body: &str) -> Self {
        let document = Html::parse_document(body);
        let base = extract_base(&document, &url).unwrap_or_else(|| url.clone());
        Self {
            url,
            base,
            document,
        }
    }

    /// URL the page was fetched from (after redirects)
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL relative links resolve against
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// The document's root element
    pub fn root(&self) -> ElementRef<'_> {
        self.document.root_element()
    }

    /// All crawlable links on the page
    pub fn links(&self) -> Vec<Url> {
        let mut collector = LinkCollector::default();
        if let Ok(selector) = Selector::parse(LINK_SELECTOR) {
            for element in self.document.select(&selector) {
                collector.push(self.link_target(element));
            }
        }
        collector.links
    }

    /// Links located inside (or on) the elements a locator matches
    pub fn links_within(&self, region: &Locator) -> Vec<Url> {
        let mut collector = LinkCollector::default();
        let Ok(selector) = Selector::parse(LINK_SELECTOR) else {
            return collector.links;
        };

        for element in region.elements(self.root()) {
            if selector.matches(&element) {
                collector.push(self.link_target(element));
            }
            for inner in element.select(&selector) {
                collector.push(self.link_target(inner));
            }
        }
        collector.links
    }

    fn link_target(&self, element: ElementRef<'_>) -> Option<Url> {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            return None;
        }
        element
            .value()
            .attr("href")
            .and_then(|href| resolve_href(href, &self.base))
    }
}

/// Accumulates links, dropping repeats by canonical form
#[derive(Default)]
struct LinkCollector {
    seen: HashSet<String>,
    links: Vec<Url>,
}

impl LinkCollector {
    fn push(&mut self, link: Option<Url>) {
        if let Some(url) = link {
            if self.seen.insert(canonicalize_url(&url)) {
                self.links.push(url);
            }
        }
    }
}

/// Reads `<base href>`, resolved against the page URL
fn extract_base(document: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;
    page_url.join(href.trim()).ok()
}

/// Resolves a link href to an absolute crawlable URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only references
/// - Invalid or non-HTTP(S) URLs after resolution
/// - Ignored binary extensions
pub fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
        || href.starts_with('#')
    {
        return None;
    }

    match resolve_link(href, base) {
        Ok(url) if !has_ignored_extension(&url) => Some(url),
        Ok(url) => {
            tracing::trace!("Skipping binary resource link {}", url);
            None
        }
        Err(e) => {
            tracing::trace!("Dropping link '{}': {}", href, e);
            None
        }
    }
}

fn has_ignored_extension(url: &Url) -> bool {
    let last_segment = url.path().rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            IGNORED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}
