/// Checks whether a host falls under an allowed domain
///
/// A host matches when it equals the allowed domain or is any subdomain of
/// it. Both arguments are expected in lowercase.
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::matches_domain;
///
/// assert!(matches_domain("example.com", "example.com"));
/// assert!(matches_domain("example.com", "shop.example.com"));
/// assert!(!matches_domain("example.com", "myexample.com"));
/// assert!(!matches_domain("example.com", "other.com"));
/// ```
pub fn matches_domain(allowed: &str, host: &str) -> bool {
    host == allowed
        || (host.len() > allowed.len()
            && host.ends_with(allowed)
            && host.as_bytes()[host.len() - allowed.len() - 1] == b'.')
}
