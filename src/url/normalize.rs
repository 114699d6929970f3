use crate::UrlError;
use url::Url;

/// Parses and validates an absolute fetchable URL
///
/// # Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an HTTP or HTTPS scheme
/// 3. Require a host
/// 4. Remove the fragment (it never reaches the server)
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com/page#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves a link reference against the page it was found on
///
/// Relative references, protocol-relative references and `..` segments are
/// all resolved by the URL parser; the result is then validated exactly like
/// [`normalize_url`].
pub fn resolve_link(href: &str, base: &Url) -> Result<Url, UrlError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(UrlError::Excluded("empty href".to_string()));
    }

    let url = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
    normalize_parsed(url)
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Computes the deduplication key of a URL
///
/// Two URLs with the same key are the same crawl target. The key is built
/// from scheme, lowercase host, non-default port and path (dot segments are
/// already resolved by the parser), followed by the query pairs sorted by key
/// and then value. Fragments and empty queries are dropped. Blank query
/// values are kept, since servers routinely distinguish `?a=` from no `a`.
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::canonicalize_url;
/// use url::Url;
///
/// let a = Url::parse("http://Example.com:80/a/./b?z=1&a=2#frag").unwrap();
/// let b = Url::parse("http://example.com/a/b?a=2&z=1").unwrap();
/// assert_eq!(canonicalize_url(&a), canonicalize_url(&b));
/// ```
pub fn canonicalize_url(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    let mut params: Vec<(String, String)> = canonical
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        canonical.set_query(None);
    } else {
        params.sort();
        canonical
            .query_pairs_mut()
            .clear()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    canonical.into()
}
