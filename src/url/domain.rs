use url::Url;

/// Extracts the lowercase host of a URL
///
/// Ports are not part of the host: politeness and allow-listing are keyed on
/// the host alone.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_sieve::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Reed.co.uk:8443/jobs").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.reed.co.uk".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
